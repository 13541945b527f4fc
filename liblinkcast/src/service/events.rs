//! In-process event bus
//!
//! Services emit events as accounts connect and posts go out. The bus wraps
//! `tokio::sync::broadcast`: emitting never blocks, events are dropped when
//! nobody listens, and a lagging subscriber loses the oldest events first.
//!
//! # Example
//!
//! ```no_run
//! use liblinkcast::platforms::Platform;
//! use liblinkcast::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//! let mut receiver = event_bus.subscribe();
//!
//! event_bus.emit(Event::PostingStarted {
//!     account_id: "acc-1".to_string(),
//!     platform: Platform::Twitter,
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::platforms::Platform;

/// Receiving end handed out by [`EventBus::subscribe`]
pub type EventReceiver = broadcast::Receiver<Event>;

/// Fan-out of service events to any number of subscribers
///
/// Clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus
    ///
    /// # Arguments
    ///
    /// * `capacity` - Events buffered per subscriber before the oldest are
    ///   dropped for a lagging receiver
    ///
    /// # Example
    ///
    /// ```
    /// use liblinkcast::service::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    ///
    /// The receiver sees every event emitted after this call.
    ///
    /// # Example
    ///
    /// ```
    /// use liblinkcast::service::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// let _dashboard = event_bus.subscribe();
    /// let _audit_log = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 2);
    /// ```
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send to all current subscribers
    ///
    /// Never blocks. Without subscribers the event is dropped.
    ///
    /// # Arguments
    ///
    /// * `event` - The event to broadcast
    ///
    /// # Example
    ///
    /// ```
    /// use liblinkcast::platforms::Platform;
    /// use liblinkcast::service::events::{Event, EventBus};
    ///
    /// let event_bus = EventBus::new(100);
    /// event_bus.emit(Event::AccountDisconnected {
    ///     account_id: "acc-1".to_string(),
    ///     platform: Platform::TikTok,
    /// });
    /// ```
    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Number of live receivers; meant for diagnostics
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Something that happened to an account or a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AccountConnected {
        account_id: String,
        user_id: String,
        platform: Platform,
    },

    AccountDisconnected {
        account_id: String,
        platform: Platform,
    },

    TokenRefreshed {
        account_id: String,
        /// New expiry (unix seconds)
        expires_at: i64,
    },

    /// Content was queued instead of sent
    PostScheduled {
        account_id: String,
        scheduled_id: String,
        fire_at: i64,
    },

    /// Validation passed and the provider is about to be called
    PostingStarted {
        account_id: String,
        platform: Platform,
    },

    /// Position within a bulk dispatch, emitted before each account
    PostingProgress {
        account_id: String,
        /// 1-based
        index: usize,
        total: usize,
    },

    PostingCompleted {
        account_id: String,
        post_id: String,
        external_post_id: String,
    },

    PostingFailed {
        account_id: String,
        error: String,
    },
}
