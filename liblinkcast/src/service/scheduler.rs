//! Durable queue of scheduled posts
//!
//! Entries are written by [`PostingService::post_to_account`] when content
//! carries a future `scheduled_time`, or directly through
//! [`SchedulerService::enqueue`]. `link-send` drains the queue with
//! [`SchedulerService::process_due`].

use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

use super::accounts::AccountService;
use super::posting::PostingService;
use crate::error::{LinkcastError, Result};
use crate::storage::Storage;
use crate::types::{PostContent, PostOutcome, ScheduleStatus, ScheduledPost};

#[derive(Clone)]
pub struct SchedulerService {
    storage: Arc<dyn Storage>,
    accounts: AccountService,
    posting: PostingService,
}

impl SchedulerService {
    pub fn new(storage: Arc<dyn Storage>, accounts: AccountService, posting: PostingService) -> Self {
        Self {
            storage,
            accounts,
            posting,
        }
    }

    /// Queue validated content for `account_id` at `fire_at`
    ///
    /// # Errors
    ///
    /// The same validation errors as an immediate post, plus
    /// `SchedulingNotSupported` and `InvalidInput` for a fire time in the past.
    pub async fn enqueue(
        &self,
        account_id: &str,
        content: PostContent,
        fire_at: i64,
    ) -> Result<ScheduledPost> {
        let account = self.accounts.get_account(account_id).await?;
        self.posting.validate(&account, &content)?;

        if fire_at <= chrono::Utc::now().timestamp() {
            return Err(LinkcastError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }

        self.posting.schedule(&account, &content, fire_at).await
    }

    /// Queued entries, optionally for one account, soonest first
    pub async fn pending(&self, account_id: Option<&str>) -> Result<Vec<ScheduledPost>> {
        self.storage.queued_posts(account_id).await
    }

    /// Cancel a queued entry
    pub async fn cancel(&self, entry_id: &str) -> Result<()> {
        if self
            .storage
            .finish_scheduled(entry_id, ScheduleStatus::Cancelled, None, None)
            .await?
        {
            info!("Cancelled scheduled post {}", entry_id);
            return Ok(());
        }

        match self.storage.get_scheduled(entry_id).await? {
            Some(entry) => Err(LinkcastError::InvalidInput(format!(
                "Scheduled post {} is already {}",
                entry_id,
                entry.status.as_str()
            ))),
            None => Err(LinkcastError::InvalidInput(format!(
                "Scheduled post not found: {}",
                entry_id
            ))),
        }
    }

    /// Dispatch every entry due at `now`, in fire order
    ///
    /// Each entry is posted immediately and closed as `dispatched` or
    /// `failed`. The returned outcomes carry the entry id in `scheduled_id`.
    pub async fn process_due(&self, now: i64) -> Result<Vec<PostOutcome>> {
        let due = self.storage.due_scheduled(now).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!("Dispatching {} due scheduled posts", due.len());
        let mut outcomes = Vec::with_capacity(due.len());

        for (i, entry) in due.iter().enumerate() {
            if i > 0 {
                sleep(self.posting.bulk_delay()).await;
            }

            let content = PostContent {
                scheduled_time: None,
                ..entry.content.clone()
            };
            let mut outcome = self.posting.post_to_account(&entry.account_id, &content).await;

            let (status, error) = if outcome.success {
                (ScheduleStatus::Dispatched, None)
            } else {
                (ScheduleStatus::Failed, outcome.error.as_deref())
            };

            match self
                .storage
                .finish_scheduled(&entry.id, status, outcome.post_id.as_deref(), error)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Scheduled post {} left the queue while dispatching", entry.id);
                }
                Err(e) => {
                    // The rest of the batch still goes out
                    warn!("Could not close scheduled post {}: {}", entry.id, e);
                }
            }

            outcome.scheduled_id = Some(entry.id.clone());
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
