//! Error types for Linkcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LinkcastError>;

#[derive(Error, Debug)]
pub enum LinkcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // Account and validation messages reach end users verbatim
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LinkcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            LinkcastError::InvalidInput(_) => 3,
            LinkcastError::Validation(_) => 3,
            LinkcastError::Account(AccountError::UnsupportedPlatform(_)) => 3,
            LinkcastError::Account(AccountError::Unauthorized { .. }) => 2,
            LinkcastError::Account(AccountError::TokenExpired(_)) => 2,
            LinkcastError::Provider(ProviderError::Authentication(_)) => 2,
            LinkcastError::Account(_) => 1,
            LinkcastError::Provider(_) => 1,
            LinkcastError::Config(_) => 1,
            LinkcastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("No OAuth client configured for {0}")]
    MissingClient(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),
}

/// Failures reported by (or while talking to) an external platform
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Account {account_id} does not belong to user {user_id}")]
    Unauthorized { account_id: String, user_id: String },

    #[error("User already has an active {platform} account (@{username})")]
    AlreadyConnected { platform: String, username: String },

    #[error("Account {0} has no credentials; complete the OAuth connection first")]
    NotConnected(String),

    #[error("Access token for account {0} has expired; reconnect the account")]
    TokenExpired(String),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Content cannot be empty")]
    EmptyContent,

    #[error("Posting is not supported on {0}")]
    PostingNotSupported(String),

    #[error("Content exceeds {platform} character limit")]
    ContentTooLong {
        platform: String,
        limit: usize,
        actual: usize,
    },

    #[error("Too many images for {platform}: {actual} (max {limit})")]
    TooManyImages {
        platform: String,
        limit: usize,
        actual: usize,
    },

    #[error("Scheduling is not supported on {0}")]
    SchedulingNotSupported(String),

    #[error("Rate limit reached for {platform}: {limit} posts per {window}")]
    RateLimited {
        platform: String,
        limit: u32,
        window: String,
    },
}
