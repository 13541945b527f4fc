//! Linkcast - social account and post orchestration
//!
//! Links users' accounts on external social platforms through OAuth, keeps
//! their tokens fresh, and dispatches content to one or many accounts while
//! enforcing each platform's content and rate limits.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod provider;
pub mod rate_limiter;
pub mod scheduling;
pub mod service;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{LinkcastError, Result};
pub use platforms::Platform;
pub use service::LinkcastService;
pub use storage::Storage;
pub use types::{
    AccountMetrics, BulkOutcome, ConnectionStatus, PlatformAccount, PostContent, PostOutcome,
    PostRecord, PostStatus, ScheduledPost, Timeframe,
};
