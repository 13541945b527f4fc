//! Account metrics and post engagement

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;

use super::accounts::AccountService;
use crate::error::{LinkcastError, Result};
use crate::provider::ProviderClient;
use crate::storage::Storage;
use crate::types::{AccountMetrics, Engagement, PlatformAccount, PostRecord, PostStatus, Timeframe};

#[derive(Clone)]
pub struct AnalyticsService {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn ProviderClient>,
    accounts: AccountService,
}

impl AnalyticsService {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn ProviderClient>,
        accounts: AccountService,
    ) -> Self {
        Self {
            storage,
            provider,
            accounts,
        }
    }

    /// Metrics for an account over `timeframe`
    ///
    /// Unknown or disconnected accounts are an error. Anything that goes
    /// wrong on the provider side (no usable token, refresh rejected, API
    /// failure) yields zeroed metrics and a warning instead.
    pub async fn get_account_analytics(
        &self,
        account_id: &str,
        timeframe: Timeframe,
    ) -> Result<AccountMetrics> {
        let mut account = self.accounts.get_account(account_id).await?;

        let Some(access_token) = self.usable_token(&mut account).await? else {
            return Ok(AccountMetrics::default());
        };

        match self
            .provider
            .fetch_analytics(account.platform, access_token.expose_secret(), timeframe)
            .await
        {
            Ok(metrics) => Ok(metrics),
            Err(e) => {
                warn!(
                    "Analytics unavailable for {} account {}: {}",
                    account.platform, account.id, e
                );
                Ok(AccountMetrics::default())
            }
        }
    }

    /// Pull fresh engagement counters for a published post and store them
    ///
    /// When the provider cannot be reached the stored counters are returned
    /// unchanged.
    pub async fn refresh_post_engagement(&self, post_id: &str) -> Result<Engagement> {
        let record = self
            .storage
            .get_post(post_id)
            .await?
            .ok_or_else(|| LinkcastError::InvalidInput(format!("Post not found: {}", post_id)))?;

        let external_post_id = match (&record.status, &record.external_post_id) {
            (PostStatus::Published, Some(id)) => id.clone(),
            _ => {
                return Err(LinkcastError::InvalidInput(format!(
                    "Post {} was not published",
                    post_id
                )))
            }
        };

        let mut account = self.accounts.get_account(&record.account_id).await?;
        let Some(access_token) = self.usable_token(&mut account).await? else {
            return Ok(record.engagement);
        };

        match self
            .provider
            .fetch_engagement(account.platform, access_token.expose_secret(), &external_post_id)
            .await
        {
            Ok(engagement) => {
                self.storage
                    .update_post_engagement(&record.id, engagement)
                    .await?;
                Ok(engagement)
            }
            Err(e) => {
                warn!("Engagement unavailable for post {}: {}", post_id, e);
                Ok(record.engagement)
            }
        }
    }

    /// Most recent post records of an account
    pub async fn post_history(&self, account_id: &str, limit: usize) -> Result<Vec<PostRecord>> {
        self.storage.get_account_posts(account_id, limit).await
    }

    /// Refresh if needed and return the access token, or `None` when the
    /// provider cannot be used for this account right now
    async fn usable_token(&self, account: &mut PlatformAccount) -> Result<Option<SecretString>> {
        if account.access_token.is_none() {
            warn!("Account {} has no credentials", account.id);
            return Ok(None);
        }

        match self.accounts.refresh_token_if_needed(account).await {
            Ok(true) => Ok(account.access_token.clone()),
            Ok(false) => {
                self.accounts.mark_expired(account).await?;
                warn!("Account {} token expired; reconnect required", account.id);
                Ok(None)
            }
            Err(LinkcastError::Provider(e)) => {
                warn!("Account {} token refresh failed: {}", account.id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
