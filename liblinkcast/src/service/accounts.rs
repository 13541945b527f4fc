//! Account connection, token refresh and disconnection

use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{info, warn};

use super::events::{Event, EventBus};
use crate::config::{Config, DuplicatePolicy};
use crate::error::{AccountError, ConfigError, LinkcastError, ProviderError, Result};
use crate::oauth::AuthorizationRequest;
use crate::platforms::{self, Platform, PlatformConfig};
use crate::provider::ProviderClient;
use crate::storage::Storage;
use crate::types::{ConnectionStatus, PlatformAccount};

#[derive(Clone)]
pub struct AccountService {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn ProviderClient>,
    config: Arc<Config>,
    event_bus: EventBus,
}

impl AccountService {
    pub fn new(
        storage: Arc<dyn Storage>,
        provider: Arc<dyn ProviderClient>,
        config: Arc<Config>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            storage,
            provider,
            config,
            event_bus,
        }
    }

    /// The static platform table
    pub fn supported_platforms(&self) -> Vec<&'static PlatformConfig> {
        platforms::supported_platforms().collect()
    }

    /// Connect an account by exchanging an OAuth authorization code
    ///
    /// # Errors
    ///
    /// - `UnsupportedPlatform` for an unknown platform key
    /// - `AlreadyConnected` when the user already has an active account on
    ///   the platform and duplicates are rejected
    /// - `TokenExchangeFailed` when the provider rejects the code
    /// - `ProfileFetchFailed` when the profile cannot be read; nothing is stored
    pub async fn connect_account(
        &self,
        user_id: &str,
        platform: &str,
        auth_code: &str,
        redirect_uri: &str,
    ) -> Result<PlatformAccount> {
        let platform: Platform = platform.parse()?;
        self.connect(user_id, platform, auth_code, redirect_uri, None)
            .await
    }

    /// [`Self::connect_account`] for a PKCE flow whose verifier was kept by
    /// the caller, e.g. across two CLI invocations
    pub async fn connect_account_with_verifier(
        &self,
        user_id: &str,
        platform: &str,
        auth_code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<PlatformAccount> {
        let platform: Platform = platform.parse()?;
        self.connect(user_id, platform, auth_code, redirect_uri, Some(code_verifier))
            .await
    }

    /// Start an OAuth authorization for `platform`
    pub fn authorization_request(
        &self,
        platform: Platform,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest> {
        let credentials = self
            .config
            .provider(platform)
            .ok_or_else(|| ConfigError::MissingClient(platform.to_string()))?;
        AuthorizationRequest::new(platform, &credentials.client_id, redirect_uri)
    }

    /// Finish an authorization started with [`Self::authorization_request`]
    pub async fn complete_authorization(
        &self,
        user_id: &str,
        request: &AuthorizationRequest,
        auth_code: &str,
        returned_state: &str,
    ) -> Result<PlatformAccount> {
        request.verify_state(returned_state)?;
        self.connect(
            user_id,
            request.platform,
            auth_code,
            &request.redirect_uri,
            request.code_verifier.as_deref(),
        )
        .await
    }

    /// Record an account by hand; it stays `pending` until OAuth completes
    pub async fn connect_manual(
        &self,
        user_id: &str,
        platform: &str,
        username: &str,
        profile_url: Option<String>,
    ) -> Result<PlatformAccount> {
        let platform: Platform = platform.parse()?;
        if username.trim().trim_start_matches('@').is_empty() {
            return Err(LinkcastError::InvalidInput(
                "Username cannot be empty".to_string(),
            ));
        }

        let existing = self.check_duplicate(user_id, platform).await?;
        if let Some(old) = existing {
            self.deactivate(&old).await?;
        }

        let account = PlatformAccount::manual(user_id, platform, username.trim(), profile_url);
        self.storage.create_account(&account).await?;

        info!(
            "Recorded {} account @{} for user {} (pending OAuth)",
            platform, account.username, user_id
        );
        self.event_bus.emit(Event::AccountConnected {
            account_id: account.id.clone(),
            user_id: user_id.to_string(),
            platform,
        });

        Ok(account)
    }

    async fn connect(
        &self,
        user_id: &str,
        platform: Platform,
        auth_code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<PlatformAccount> {
        let existing = self.check_duplicate(user_id, platform).await?;

        let grant = self
            .provider
            .exchange_code(platform, auth_code, redirect_uri, code_verifier)
            .await?;

        let profile = match self
            .provider
            .fetch_profile(platform, grant.access_token.expose_secret())
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Profile fetch failed after {} token exchange: {}", platform, e);
                if let Err(revoke_err) = self
                    .provider
                    .revoke_token(platform, grant.access_token.expose_secret())
                    .await
                {
                    warn!("Could not revoke unused {} token: {}", platform, revoke_err);
                }
                return Err(as_stage(e, ProviderError::ProfileFetchFailed).into());
            }
        };

        if let Some(old) = existing {
            self.deactivate(&old).await?;
        }

        let account = PlatformAccount::from_grant(user_id, platform, grant, profile);
        self.storage.create_account(&account).await?;

        info!(
            "Connected {} account @{} for user {}",
            platform, account.username, user_id
        );
        self.event_bus.emit(Event::AccountConnected {
            account_id: account.id.clone(),
            user_id: user_id.to_string(),
            platform,
        });

        Ok(account)
    }

    /// Apply the duplicate policy; returns the account to replace, if any
    async fn check_duplicate(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<PlatformAccount>> {
        let Some(existing) = self.storage.find_active_account(user_id, platform).await? else {
            return Ok(None);
        };

        // A manual record never had credentials and is always superseded
        if existing.connection_status == ConnectionStatus::Pending {
            return Ok(Some(existing));
        }

        match self.config.dispatch.on_duplicate {
            DuplicatePolicy::Reject => Err(AccountError::AlreadyConnected {
                platform: platform.to_string(),
                username: existing.username,
            }
            .into()),
            DuplicatePolicy::Replace => Ok(Some(existing)),
        }
    }

    /// Active accounts of a user
    pub async fn get_user_accounts(&self, user_id: &str) -> Result<Vec<PlatformAccount>> {
        self.storage.get_user_accounts(user_id).await
    }

    /// Load an active account
    pub async fn get_account(&self, account_id: &str) -> Result<PlatformAccount> {
        match self.storage.get_account(account_id).await? {
            Some(account) if account.is_active => Ok(account),
            _ => Err(AccountError::NotFound(account_id.to_string()).into()),
        }
    }

    /// Make sure the account's access token is usable
    ///
    /// Returns `true` when the token has not expired or was refreshed, and
    /// `false` when it expired and there is no refresh token (the account is
    /// left untouched). A rejected refresh marks the account expired and
    /// fails with `TokenRefreshFailed`.
    pub async fn refresh_token_if_needed(&self, account: &mut PlatformAccount) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        if !account.is_token_expired(now) {
            return Ok(true);
        }

        let Some(refresh_token) = account.refresh_token.clone() else {
            return Ok(false);
        };

        let previous_expiry = account.token_expiry.unwrap_or(now);
        let result = self
            .provider
            .refresh_token(account.platform, refresh_token.expose_secret())
            .await
            .and_then(|grant| {
                if grant.expires_at > previous_expiry.max(now) {
                    Ok(grant)
                } else {
                    Err(ProviderError::TokenRefreshFailed(
                        "provider issued an already expired token".to_string(),
                    ))
                }
            });

        match result {
            Ok(grant) => {
                account.apply_grant(grant);
                self.storage.update_account(account).await?;

                info!("Refreshed {} token for account {}", account.platform, account.id);
                self.event_bus.emit(Event::TokenRefreshed {
                    account_id: account.id.clone(),
                    expires_at: account.token_expiry.unwrap_or_default(),
                });
                Ok(true)
            }
            Err(e) => {
                warn!("Token refresh failed for account {}: {}", account.id, e);
                account.connection_status = ConnectionStatus::Expired;
                self.storage.update_account(account).await?;
                Err(as_stage(e, ProviderError::TokenRefreshFailed).into())
            }
        }
    }

    /// Persist that the account needs to be reconnected
    pub async fn mark_expired(&self, account: &mut PlatformAccount) -> Result<()> {
        account.connection_status = ConnectionStatus::Expired;
        self.storage.update_account(account).await?;
        info!("Account {} marked expired; reconnect required", account.id);
        Ok(())
    }

    /// Refresh the token of an account by id
    ///
    /// Marks the account expired when it cannot be refreshed.
    pub async fn refresh_account(&self, account_id: &str) -> Result<PlatformAccount> {
        let mut account = self.get_account(account_id).await?;
        if account.access_token.is_none() {
            return Err(AccountError::NotConnected(account.id).into());
        }

        if !self.refresh_token_if_needed(&mut account).await? {
            self.mark_expired(&mut account).await?;
            return Err(AccountError::TokenExpired(account.id).into());
        }
        Ok(account)
    }

    /// Refresh the token and re-read the profile from the platform
    pub async fn sync_account(&self, account_id: &str) -> Result<PlatformAccount> {
        let mut account = self.refresh_account(account_id).await?;
        let access_token = account
            .access_token
            .clone()
            .ok_or_else(|| AccountError::NotConnected(account.id.clone()))?;

        match self
            .provider
            .fetch_profile(account.platform, access_token.expose_secret())
            .await
        {
            Ok(profile) => {
                account.apply_profile(profile);
                account.connection_status = ConnectionStatus::Connected;
                self.storage.update_account(&account).await?;
                info!("Synced {} account @{}", account.platform, account.username);
                Ok(account)
            }
            Err(e) => {
                warn!("Profile sync failed for account {}: {}", account.id, e);
                account.connection_status = ConnectionStatus::Error;
                self.storage.update_account(&account).await?;
                Err(as_stage(e, ProviderError::ProfileFetchFailed).into())
            }
        }
    }

    /// Disconnect an account owned by `user_id`
    ///
    /// Returns `false` if the account was already disconnected. Post records
    /// are kept; queued scheduled posts are cancelled.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id and `Unauthorized` when the account
    /// belongs to another user.
    pub async fn disconnect_account(&self, user_id: &str, account_id: &str) -> Result<bool> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| AccountError::NotFound(account_id.to_string()))?;

        if account.user_id != user_id {
            return Err(AccountError::Unauthorized {
                account_id: account_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        if !account.is_active {
            return Ok(false);
        }

        self.deactivate(&account).await
    }

    /// Revoke best-effort, then soft-delete and cancel queued posts
    async fn deactivate(&self, account: &PlatformAccount) -> Result<bool> {
        if let Some(token) = &account.access_token {
            if let Err(e) = self
                .provider
                .revoke_token(account.platform, token.expose_secret())
                .await
            {
                warn!(
                    "Token revocation failed for account {} ({}): {}",
                    account.id, account.platform, e
                );
            }
        }

        let deactivated = self.storage.deactivate_account(&account.id).await?;
        let cancelled = self.storage.cancel_account_schedule(&account.id).await?;

        info!(
            "Disconnected {} account @{} ({} scheduled posts cancelled)",
            account.platform, account.username, cancelled
        );
        self.event_bus.emit(Event::AccountDisconnected {
            account_id: account.id.clone(),
            platform: account.platform,
        });

        Ok(deactivated)
    }
}

/// Report a provider failure as the stage it happened in
fn as_stage(error: ProviderError, stage: fn(String) -> ProviderError) -> ProviderError {
    let wrapped = stage(String::new());
    if std::mem::discriminant(&error) == std::mem::discriminant(&wrapped) {
        error
    } else {
        stage(error.to_string())
    }
}
