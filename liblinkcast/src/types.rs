//! Core types for Linkcast

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::LinkcastError;
use crate::platforms::Platform;

// ============================================================================
// Accounts
// ============================================================================

/// The orchestrator's belief about whether an account's credentials work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Expired,
    Error,
    Pending,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Expired => "expired",
            Self::Error => "error",
            Self::Pending => "pending",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(Self::Connected),
            "expired" => Ok(Self::Expired),
            "error" => Ok(Self::Error),
            "pending" => Ok(Self::Pending),
            other => Err(format!("unknown connection status '{}'", other)),
        }
    }
}

/// A user's linked credential and profile on one platform
///
/// Tokens are held as [`SecretString`] so they never appear in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub struct PlatformAccount {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub follower_count: i64,
    pub is_verified: bool,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    /// Unix timestamp after which the access token is no longer valid
    pub token_expiry: Option<i64>,
    pub scope: Option<String>,
    pub is_active: bool,
    pub last_sync: Option<i64>,
    pub connection_status: ConnectionStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlatformAccount {
    /// Build a connected account from a fresh token grant and profile
    pub fn from_grant(
        user_id: &str,
        platform: Platform,
        grant: TokenGrant,
        profile: ExternalProfile,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            platform,
            username: profile.username,
            display_name: profile.display_name,
            profile_url: profile.profile_url,
            follower_count: profile.follower_count,
            is_verified: profile.is_verified,
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            token_expiry: Some(grant.expires_at),
            scope: grant.scope,
            is_active: true,
            last_sync: Some(now),
            connection_status: ConnectionStatus::Connected,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a pending account recorded by hand, without credentials
    pub fn manual(
        user_id: &str,
        platform: Platform,
        username: &str,
        profile_url: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            platform,
            username: username.trim_start_matches('@').to_string(),
            display_name: None,
            profile_url,
            follower_count: 0,
            is_verified: false,
            access_token: None,
            refresh_token: None,
            token_expiry: None,
            scope: None,
            is_active: true,
            last_sync: None,
            connection_status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the access token expired at or before `now`
    ///
    /// An account without an expiry is treated as non-expiring.
    pub fn is_token_expired(&self, now: i64) -> bool {
        matches!(self.token_expiry, Some(expiry) if expiry <= now)
    }

    /// Apply a refreshed grant, keeping the old refresh token if none was issued
    pub fn apply_grant(&mut self, grant: TokenGrant) {
        self.access_token = Some(grant.access_token);
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token;
        }
        if grant.scope.is_some() {
            self.scope = grant.scope;
        }
        self.token_expiry = Some(grant.expires_at);
        self.connection_status = ConnectionStatus::Connected;
    }

    /// Apply a freshly fetched profile
    pub fn apply_profile(&mut self, profile: ExternalProfile) {
        self.username = profile.username;
        self.display_name = profile.display_name;
        if profile.profile_url.is_some() {
            self.profile_url = profile.profile_url;
        }
        self.follower_count = profile.follower_count;
        self.is_verified = profile.is_verified;
        self.last_sync = Some(chrono::Utc::now().timestamp());
    }

    /// Public view of the account, without tokens
    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            platform: self.platform,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            profile_url: self.profile_url.clone(),
            follower_count: self.follower_count,
            is_verified: self.is_verified,
            token_expiry: self.token_expiry,
            is_active: self.is_active,
            last_sync: self.last_sync,
            connection_status: self.connection_status,
        }
    }
}

/// Serializable account view for CLIs and APIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub follower_count: i64,
    pub is_verified: bool,
    pub token_expiry: Option<i64>,
    pub is_active: bool,
    pub last_sync: Option<i64>,
    pub connection_status: ConnectionStatus,
}

/// Tokens issued by a provider's token endpoint
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Absolute expiry (unix seconds)
    pub expires_at: i64,
    pub scope: Option<String>,
}

/// Profile of the external account behind a token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub external_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_url: Option<String>,
    pub follower_count: i64,
    pub is_verified: bool,
}

// ============================================================================
// Posts
// ============================================================================

/// Content submitted for dispatch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub video: Option<String>,
    /// Unix timestamp; a future value queues the post instead of sending it
    #[serde(default)]
    pub scheduled_time: Option<i64>,
}

impl PostContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_video(mut self, video: impl Into<String>) -> Self {
        self.video = Some(video.into());
        self
    }

    pub fn scheduled_at(mut self, timestamp: i64) -> Self {
        self.scheduled_time = Some(timestamp);
        self
    }

    /// Length as users count it (characters, not bytes)
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    /// Status only moves forward: pending to published or failed
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Published) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown post status '{}'", other)),
        }
    }
}

/// Engagement counters, changed only by an engagement refresh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engagement {
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub account_id: String,
    pub platform: Platform,
    pub text: String,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
    pub external_post_id: Option<String>,
    pub status: PostStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub published_at: Option<i64>,
    pub engagement: Engagement,
}

impl PostRecord {
    /// New pending record for content about to be dispatched
    pub fn pending(account: &PlatformAccount, content: &PostContent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account.id.clone(),
            platform: account.platform,
            text: content.text.clone(),
            image_urls: content.images.clone(),
            video_url: content.video.clone(),
            external_post_id: None,
            status: PostStatus::Pending,
            error_message: None,
            created_at: chrono::Utc::now().timestamp(),
            published_at: None,
            engagement: Engagement::default(),
        }
    }
}

/// Result of dispatching (or queueing) content for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostOutcome {
    pub account_id: String,
    pub platform: Option<Platform>,
    pub success: bool,
    /// Local post record id
    pub post_id: Option<String>,
    pub external_post_id: Option<String>,
    /// Queue entry id when the content was scheduled
    pub scheduled_id: Option<String>,
    pub error: Option<String>,
    /// Process exit code matching the failure; 0 on success
    #[serde(skip)]
    pub exit_code: i32,
}

impl PostOutcome {
    pub fn published(record: &PostRecord) -> Self {
        Self {
            account_id: record.account_id.clone(),
            platform: Some(record.platform),
            success: true,
            post_id: Some(record.id.clone()),
            external_post_id: record.external_post_id.clone(),
            scheduled_id: None,
            error: None,
            exit_code: 0,
        }
    }

    pub fn scheduled(entry: &ScheduledPost, platform: Platform) -> Self {
        Self {
            account_id: entry.account_id.clone(),
            platform: Some(platform),
            success: true,
            post_id: None,
            external_post_id: None,
            scheduled_id: Some(entry.id.clone()),
            error: None,
            exit_code: 0,
        }
    }

    pub fn failed(account_id: &str, platform: Option<Platform>, error: &LinkcastError) -> Self {
        Self {
            account_id: account_id.to_string(),
            platform,
            success: false,
            post_id: None,
            external_post_id: None,
            scheduled_id: None,
            error: Some(error.to_string()),
            exit_code: error.exit_code(),
        }
    }
}

/// Result of dispatching one content item to many accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// True when at least one account succeeded
    pub success: bool,
    pub results: Vec<PostOutcome>,
}

impl BulkOutcome {
    pub fn from_results(results: Vec<PostOutcome>) -> Self {
        Self {
            success: results.iter().any(|r| r.success),
            results,
        }
    }
}

// ============================================================================
// Analytics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Day,
    Week,
    Month,
    Year,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "1d" => Ok(Self::Day),
            "week" | "7d" => Ok(Self::Week),
            "month" | "30d" => Ok(Self::Month),
            "year" | "365d" => Ok(Self::Year),
            _ => Err(format!(
                "Invalid timeframe: '{}'. Valid options: day, week, month, year",
                s
            )),
        }
    }
}

/// Account-level metrics; all zero when the provider could not be reached
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountMetrics {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
    pub impressions: i64,
    pub reach: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub views: i64,
    pub engagement_rate: f64,
}

// ============================================================================
// Scheduled posts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Queued,
    Dispatched,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "dispatched" => Ok(Self::Dispatched),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown schedule status '{}'", other)),
        }
    }
}

/// A post waiting in the queue for its fire time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub account_id: String,
    pub content: PostContent,
    pub fire_at: i64,
    pub status: ScheduleStatus,
    pub post_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: i64,
}

impl ScheduledPost {
    pub fn new(account_id: &str, content: PostContent, fire_at: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            content: PostContent {
                scheduled_time: None,
                ..content
            },
            fire_at,
            status: ScheduleStatus::Queued,
            post_id: None,
            last_error: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}
