//! Persistence seam used by the service layer
//!
//! [`crate::db::Database`] is the SQLite implementation. Services only see
//! `Arc<dyn Storage>`, so tests can run against a throwaway database and
//! embedders can bring their own backend.

use async_trait::async_trait;

use crate::error::Result;
use crate::platforms::Platform;
use crate::types::{Engagement, PlatformAccount, PostRecord, ScheduleStatus, ScheduledPost};

#[async_trait]
pub trait Storage: Send + Sync {
    // Accounts

    async fn create_account(&self, account: &PlatformAccount) -> Result<()>;

    async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>>;

    /// Active accounts of a user, oldest first
    async fn get_user_accounts(&self, user_id: &str) -> Result<Vec<PlatformAccount>>;

    async fn find_active_account(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<PlatformAccount>>;

    /// Persist every mutable field of the account and bump `updated_at`
    async fn update_account(&self, account: &PlatformAccount) -> Result<()>;

    /// Soft-delete: clear tokens and mark inactive
    ///
    /// Returns `false` when the account was already inactive or missing.
    async fn deactivate_account(&self, account_id: &str) -> Result<bool>;

    // Post records

    async fn create_post(&self, record: &PostRecord) -> Result<()>;

    async fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>>;

    /// Most recent records of an account first
    async fn get_account_posts(&self, account_id: &str, limit: usize) -> Result<Vec<PostRecord>>;

    /// Move a pending record to its final status
    ///
    /// Fails with `DbError::InvalidTransition` when the stored record is no
    /// longer pending.
    async fn finish_post(&self, record: &PostRecord) -> Result<()>;

    async fn update_post_engagement(&self, post_id: &str, engagement: Engagement) -> Result<()>;

    // Schedule queue

    async fn enqueue(&self, entry: &ScheduledPost) -> Result<()>;

    async fn get_scheduled(&self, entry_id: &str) -> Result<Option<ScheduledPost>>;

    /// Queued entries whose fire time is at or before `now`
    async fn due_scheduled(&self, now: i64) -> Result<Vec<ScheduledPost>>;

    /// Queued entries, optionally for one account, soonest first
    async fn queued_posts(&self, account_id: Option<&str>) -> Result<Vec<ScheduledPost>>;

    /// Close a queued entry; returns `false` if it was not queued anymore
    async fn finish_scheduled(
        &self,
        entry_id: &str,
        status: ScheduleStatus,
        post_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool>;

    /// Cancel every queued entry of an account, returning how many were cancelled
    async fn cancel_account_schedule(&self, account_id: &str) -> Result<u64>;

    // Rate windows

    async fn window_count(&self, account_id: &str, window_secs: i64, window_start: i64)
        -> Result<u32>;

    async fn increment_window(
        &self,
        account_id: &str,
        window_secs: i64,
        window_start: i64,
    ) -> Result<()>;

    /// Drop windows that started before `cutoff`
    async fn delete_windows_before(&self, cutoff: i64) -> Result<u64>;
}
