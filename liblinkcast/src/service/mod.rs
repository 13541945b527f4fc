//! Service layer for Linkcast
//!
//! `LinkcastService` is the entry point the binaries (and any embedding
//! application) use. It owns the shared storage, provider client,
//! configuration and event bus, and hands out specialised sub-services:
//!
//! - `AccountService`: OAuth connection, token refresh, sync, disconnection
//! - `PostingService`: validated single and bulk dispatch
//! - `AnalyticsService`: account metrics and post engagement
//! - `SchedulerService`: the durable scheduled-post queue
//! - `EventBus`: progress events for interested subscribers
//!
//! There is no global instance. Construct one per process (or per test)
//! and clone it freely; clones share the same state.
//!
//! # Example
//!
//! ```no_run
//! use liblinkcast::service::LinkcastService;
//! use liblinkcast::PostContent;
//!
//! # async fn example() -> liblinkcast::Result<()> {
//! let service = LinkcastService::new().await?;
//!
//! let account = service
//!     .accounts()
//!     .connect_account("user-1", "twitter", "abc123", "https://app/callback")
//!     .await?;
//!
//! let outcome = service
//!     .posting()
//!     .post_to_account(&account.id, &PostContent::text("Open gym tonight at 7"))
//!     .await;
//! println!("success: {}", outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod accounts;
pub mod analytics;
pub mod events;
pub mod posting;
pub mod scheduler;

use std::sync::Arc;

use self::accounts::AccountService;
use self::analytics::AnalyticsService;
use self::events::EventBus;
use self::posting::PostingService;
use self::scheduler::SchedulerService;
use crate::provider::{HttpProvider, ProviderClient};
use crate::storage::Storage;
use crate::{Config, Database, Result};

const EVENT_CAPACITY: usize = 100;

/// Facade over all Linkcast services
///
/// Cheap to clone; clones share storage, provider, configuration and the
/// event bus.
#[derive(Clone)]
pub struct LinkcastService {
    storage: Arc<dyn Storage>,
    config: Arc<Config>,
    accounts: AccountService,
    posting: PostingService,
    analytics: AnalyticsService,
    scheduler: SchedulerService,
    event_bus: EventBus,
}

impl LinkcastService {
    /// Create a service from the configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded, the database
    /// cannot be opened or migrated, or the HTTP client cannot be built.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service backed by SQLite and the HTTP provider
    ///
    /// # Errors
    ///
    /// Returns `LinkcastError::Database` if the database cannot be opened or
    /// migrated, and `LinkcastError::Provider` if the HTTP client cannot be
    /// built from the `[http]` section.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let provider = HttpProvider::new(&config)?;
        Ok(Self::with_components(
            Arc::new(db),
            Arc::new(provider),
            config,
        ))
    }

    /// Assemble a service from explicit parts
    ///
    /// Tests use this to plug in a `MockProvider`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use liblinkcast::provider::MockProvider;
    /// use liblinkcast::{Config, Database, LinkcastService};
    ///
    /// # async fn example() -> liblinkcast::Result<()> {
    /// let config = Config::default_config();
    /// let db = Database::new("/tmp/linkcast-demo.db").await?;
    /// let service = LinkcastService::with_components(
    ///     Arc::new(db),
    ///     Arc::new(MockProvider::success()),
    ///     config,
    /// );
    /// assert!(service.accounts().get_user_accounts("user-1").await?.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_components(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn ProviderClient>,
        config: Config,
    ) -> Self {
        let config = Arc::new(config);
        let event_bus = EventBus::new(EVENT_CAPACITY);

        let accounts = AccountService::new(
            Arc::clone(&storage),
            Arc::clone(&provider),
            Arc::clone(&config),
            event_bus.clone(),
        );
        let posting = PostingService::new(
            Arc::clone(&storage),
            Arc::clone(&provider),
            Arc::clone(&config),
            accounts.clone(),
            event_bus.clone(),
        );
        let analytics =
            AnalyticsService::new(Arc::clone(&storage), Arc::clone(&provider), accounts.clone());
        let scheduler = SchedulerService::new(Arc::clone(&storage), accounts.clone(), posting.clone());

        Self {
            storage,
            config,
            accounts,
            posting,
            analytics,
            scheduler,
            event_bus,
        }
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Account connection, refresh, sync and disconnection
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn posting(&self) -> &PostingService {
        &self.posting
    }

    pub fn analytics(&self) -> &AnalyticsService {
        &self.analytics
    }

    /// The scheduled-post queue
    pub fn scheduler(&self) -> &SchedulerService {
        &self.scheduler
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> events::EventReceiver {
        self.event_bus.subscribe()
    }
}
