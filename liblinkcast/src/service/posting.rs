//! Dispatching content to linked accounts
//!
//! Every precondition (ownership state, content limits, scheduling support,
//! credentials, rate windows) is checked before the provider is contacted,
//! and a `PostRecord` exists only for posts that actually reached it.
//! Dispatch never retries and bulk dispatch is strictly sequential.

use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::accounts::AccountService;
use super::events::{Event, EventBus};
use crate::config::Config;
use crate::error::{AccountError, LinkcastError, Result, ValidationError};
use crate::platforms::Platform;
use crate::provider::ProviderClient;
use crate::rate_limiter::RateLimiter;
use crate::storage::Storage;
use crate::types::{
    BulkOutcome, PlatformAccount, PostContent, PostOutcome, PostRecord, PostStatus, ScheduledPost,
};

#[derive(Clone)]
pub struct PostingService {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn ProviderClient>,
    config: Arc<Config>,
    accounts: AccountService,
    rate_limiter: RateLimiter,
    event_bus: EventBus,
}

impl PostingService {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn ProviderClient>,
        config: Arc<Config>,
        accounts: AccountService,
        event_bus: EventBus,
    ) -> Self {
        let rate_limiter = RateLimiter::new(Arc::clone(&storage));
        Self {
            storage,
            provider,
            config,
            accounts,
            rate_limiter,
            event_bus,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Pause between consecutive dispatches of a bulk post or queue drain
    pub fn bulk_delay(&self) -> Duration {
        self.config.dispatch.bulk_delay()
    }

    /// Post (or queue) content for one account
    ///
    /// Never fails: every error, from a missing account to a provider
    /// rejection, comes back as an unsuccessful [`PostOutcome`] carrying the
    /// error message.
    pub async fn post_to_account(&self, account_id: &str, content: &PostContent) -> PostOutcome {
        let account = match self.accounts.get_account(account_id).await {
            Ok(account) => account,
            Err(e) => return self.failed(account_id, None, e),
        };

        let platform = account.platform;
        match self.dispatch(account, content).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed(account_id, Some(platform), e),
        }
    }

    /// Post the same content to several accounts, one after another
    ///
    /// Results come back in input order, one per id. The bulk succeeds when
    /// at least one account succeeded.
    pub async fn post_to_multiple_accounts(
        &self,
        account_ids: &[String],
        content: &PostContent,
    ) -> BulkOutcome {
        let total = account_ids.len();
        let mut results = Vec::with_capacity(total);

        for (i, account_id) in account_ids.iter().enumerate() {
            if i > 0 {
                sleep(self.bulk_delay()).await;
            }

            self.event_bus.emit(Event::PostingProgress {
                account_id: account_id.clone(),
                index: i + 1,
                total,
            });
            results.push(self.post_to_account(account_id, content).await);
        }

        let outcome = BulkOutcome::from_results(results);
        info!(
            "Bulk dispatch finished: {}/{} accounts succeeded",
            outcome.results.iter().filter(|r| r.success).count(),
            total
        );
        outcome
    }

    /// Check content against the account's platform limits
    pub fn validate(&self, account: &PlatformAccount, content: &PostContent) -> Result<()> {
        let platform = account.platform;
        let config = platform.config();

        if content.text.trim().is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        if !config.capabilities.can_post {
            return Err(ValidationError::PostingNotSupported(platform.to_string()).into());
        }

        let chars = content.char_count();
        if chars > config.limits.characters_per_post {
            return Err(ValidationError::ContentTooLong {
                platform: platform.to_string(),
                limit: config.limits.characters_per_post,
                actual: chars,
            }
            .into());
        }

        if content.images.len() > config.limits.images_per_post {
            return Err(ValidationError::TooManyImages {
                platform: platform.to_string(),
                limit: config.limits.images_per_post,
                actual: content.images.len(),
            }
            .into());
        }

        Ok(())
    }

    /// Store a queue entry for validated content
    pub async fn schedule(
        &self,
        account: &PlatformAccount,
        content: &PostContent,
        fire_at: i64,
    ) -> Result<ScheduledPost> {
        if !account.platform.config().capabilities.can_schedule {
            return Err(ValidationError::SchedulingNotSupported(account.platform.to_string()).into());
        }

        let entry = ScheduledPost::new(&account.id, content.clone(), fire_at);
        self.storage.enqueue(&entry).await?;

        info!(
            "Queued post {} for {} account {} at {}",
            entry.id, account.platform, account.id, fire_at
        );
        self.event_bus.emit(Event::PostScheduled {
            account_id: account.id.clone(),
            scheduled_id: entry.id.clone(),
            fire_at,
        });

        Ok(entry)
    }

    async fn dispatch(
        &self,
        mut account: PlatformAccount,
        content: &PostContent,
    ) -> Result<PostOutcome> {
        self.validate(&account, content)?;

        let now = chrono::Utc::now().timestamp();
        if let Some(fire_at) = content.scheduled_time.filter(|t| *t > now) {
            let entry = self.schedule(&account, content, fire_at).await?;
            return Ok(PostOutcome::scheduled(&entry, account.platform));
        }

        if account.access_token.is_none() {
            return Err(AccountError::NotConnected(account.id).into());
        }

        self.rate_limiter
            .check(&account.id, account.platform, now)
            .await?;

        if !self.accounts.refresh_token_if_needed(&mut account).await? {
            self.accounts.mark_expired(&mut account).await?;
            return Err(AccountError::TokenExpired(account.id).into());
        }

        let access_token = account
            .access_token
            .clone()
            .ok_or_else(|| AccountError::NotConnected(account.id.clone()))?;

        self.event_bus.emit(Event::PostingStarted {
            account_id: account.id.clone(),
            platform: account.platform,
        });

        let mut record = PostRecord::pending(&account, content);
        self.storage.create_post(&record).await?;

        match self
            .provider
            .publish(account.platform, access_token.expose_secret(), content)
            .await
        {
            Ok(external_post_id) => {
                let published_at = chrono::Utc::now().timestamp();
                record.status = PostStatus::Published;
                record.external_post_id = Some(external_post_id.clone());
                record.published_at = Some(published_at);
                self.storage.finish_post(&record).await?;

                if let Err(e) = self.rate_limiter.record(&account.id, published_at).await {
                    warn!("Could not record rate window for {}: {}", account.id, e);
                }

                info!(
                    "Published to {} account {} ({})",
                    account.platform, account.id, external_post_id
                );
                self.event_bus.emit(Event::PostingCompleted {
                    account_id: account.id.clone(),
                    post_id: record.id.clone(),
                    external_post_id,
                });

                Ok(PostOutcome::published(&record))
            }
            Err(e) => {
                let error = LinkcastError::from(e);
                record.status = PostStatus::Failed;
                record.error_message = Some(error.to_string());
                self.storage.finish_post(&record).await?;

                let mut outcome = self.failed(&account.id, Some(account.platform), error);
                outcome.post_id = Some(record.id);
                Ok(outcome)
            }
        }
    }

    fn failed(
        &self,
        account_id: &str,
        platform: Option<Platform>,
        error: LinkcastError,
    ) -> PostOutcome {
        warn!("Posting to account {} failed: {}", account_id, error);
        self.event_bus.emit(Event::PostingFailed {
            account_id: account_id.to_string(),
            error: error.to_string(),
        });
        PostOutcome::failed(account_id, platform, &error)
    }
}
