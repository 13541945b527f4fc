//! Configurable in-process provider
//!
//! `MockProvider` answers every [`ProviderClient`] call deterministically
//! without network access. Each stage can be told to fail, publishing can
//! fail for selected platforms only, and every call is counted so tests can
//! assert that validation happened before any provider traffic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

use super::{ProviderClient, ProviderResult};
use crate::error::ProviderError;
use crate::platforms::Platform;
use crate::types::{
    AccountMetrics, Engagement, ExternalProfile, PostContent, TokenGrant, Timeframe,
};

/// Behaviour of a [`MockProvider`]
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub exchange_succeeds: bool,
    pub refresh_succeeds: bool,
    pub profile_succeeds: bool,
    pub analytics_succeeds: bool,
    pub revoke_succeeds: bool,

    /// Platforms whose publish call fails, with the error message to return
    pub publish_failures: HashMap<Platform, String>,

    /// Lifetime of issued access tokens
    pub token_ttl_secs: i64,

    /// Whether token grants include a refresh token
    pub issue_refresh_token: bool,

    /// Username reported by profile fetches; defaults to `<platform>_user`
    pub profile_username: Option<String>,

    pub follower_count: i64,

    pub metrics: AccountMetrics,

    pub engagement: Engagement,

    /// Latency added to every call
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            exchange_succeeds: true,
            refresh_succeeds: true,
            profile_succeeds: true,
            analytics_succeeds: true,
            revoke_succeeds: true,
            publish_failures: HashMap::new(),
            token_ttl_secs: 3600,
            issue_refresh_token: true,
            profile_username: None,
            follower_count: 250,
            metrics: AccountMetrics {
                followers: 250,
                following: 80,
                posts: 12,
                impressions: 4000,
                reach: 3100,
                likes: 320,
                comments: 41,
                shares: 18,
                views: 5200,
                engagement_rate: 4.2,
            },
            engagement: Engagement {
                likes: 10,
                comments: 3,
                shares: 2,
                views: 150,
            },
            delay: Duration::ZERO,
        }
    }
}

/// Number of calls made to each stage
#[derive(Debug, Default)]
struct CallCounts {
    exchange: AtomicUsize,
    refresh: AtomicUsize,
    profile: AtomicUsize,
    publish: AtomicUsize,
    analytics: AtomicUsize,
    engagement: AtomicUsize,
    revoke: AtomicUsize,
}

pub struct MockProvider {
    config: Mutex<MockConfig>,
    calls: CallCounts,
    serial: AtomicUsize,
    published: Mutex<Vec<(Platform, String)>>,
}

impl MockProvider {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Mutex::new(config),
            calls: CallCounts::default(),
            serial: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// A provider on which every call succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A provider whose publish call fails on one platform
    pub fn publish_fails_on(platform: Platform, error: &str) -> Self {
        let mut config = MockConfig::default();
        config.publish_failures.insert(platform, error.to_string());
        Self::new(config)
    }

    /// Change behaviour after the provider has been handed to a service
    pub fn configure(&self, update: impl FnOnce(&mut MockConfig)) {
        let mut config = self.config.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut config);
    }

    fn snapshot(&self) -> MockConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_serial(&self) -> usize {
        self.serial.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn grant(&self, platform: Platform, config: &MockConfig) -> TokenGrant {
        let n = self.next_serial();
        TokenGrant {
            access_token: format!("{}-access-{}", platform, n).into(),
            refresh_token: config
                .issue_refresh_token
                .then(|| format!("{}-refresh-{}", platform, n).into()),
            expires_at: chrono::Utc::now().timestamp() + config.token_ttl_secs,
            scope: Some(platform.config().scopes.join(" ")),
        }
    }

    async fn latency(&self, config: &MockConfig) {
        if !config.delay.is_zero() {
            sleep(config.delay).await;
        }
    }

    pub fn exchange_calls(&self) -> usize {
        self.calls.exchange.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls.refresh.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.calls.profile.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.calls.publish.load(Ordering::SeqCst)
    }

    pub fn analytics_calls(&self) -> usize {
        self.calls.analytics.load(Ordering::SeqCst)
    }

    pub fn engagement_calls(&self) -> usize {
        self.calls.engagement.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.calls.revoke.load(Ordering::SeqCst)
    }

    /// Total calls across all stages
    pub fn total_calls(&self) -> usize {
        self.exchange_calls()
            + self.refresh_calls()
            + self.profile_calls()
            + self.publish_calls()
            + self.analytics_calls()
            + self.engagement_calls()
            + self.revoke_calls()
    }

    /// Successfully published texts, in order
    pub fn published(&self) -> Vec<(Platform, String)> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    async fn exchange_code(
        &self,
        platform: Platform,
        code: &str,
        _redirect_uri: &str,
        _code_verifier: Option<&str>,
    ) -> ProviderResult<TokenGrant> {
        self.calls.exchange.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.exchange_succeeds || code.is_empty() {
            return Err(ProviderError::TokenExchangeFailed(format!(
                "{} rejected authorization code",
                platform
            )));
        }
        Ok(self.grant(platform, &config))
    }

    async fn refresh_token(
        &self,
        platform: Platform,
        _refresh_token: &str,
    ) -> ProviderResult<TokenGrant> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.refresh_succeeds {
            return Err(ProviderError::TokenRefreshFailed(format!(
                "{} rejected refresh token",
                platform
            )));
        }
        Ok(self.grant(platform, &config))
    }

    async fn fetch_profile(
        &self,
        platform: Platform,
        _access_token: &str,
    ) -> ProviderResult<ExternalProfile> {
        self.calls.profile.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.profile_succeeds {
            return Err(ProviderError::ProfileFetchFailed(format!(
                "{} profile unavailable",
                platform
            )));
        }

        let username = config
            .profile_username
            .clone()
            .unwrap_or_else(|| format!("{}_user", platform));
        Ok(ExternalProfile {
            external_id: format!("{}-{}", platform, self.next_serial()),
            display_name: Some(username.clone()),
            profile_url: Some(format!("https://{}.example/{}", platform, username)),
            username,
            follower_count: config.follower_count,
            is_verified: false,
        })
    }

    async fn publish(
        &self,
        platform: Platform,
        _access_token: &str,
        content: &PostContent,
    ) -> ProviderResult<String> {
        self.calls.publish.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if let Some(error) = config.publish_failures.get(&platform) {
            return Err(ProviderError::Posting(error.clone()));
        }

        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((platform, content.text.clone()));
        Ok(format!("{}-post-{}", platform, self.next_serial()))
    }

    async fn fetch_analytics(
        &self,
        platform: Platform,
        _access_token: &str,
        _timeframe: Timeframe,
    ) -> ProviderResult<AccountMetrics> {
        self.calls.analytics.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.analytics_succeeds {
            return Err(ProviderError::Network(format!(
                "{} analytics unavailable",
                platform
            )));
        }
        Ok(config.metrics)
    }

    async fn fetch_engagement(
        &self,
        platform: Platform,
        _access_token: &str,
        _external_post_id: &str,
    ) -> ProviderResult<Engagement> {
        self.calls.engagement.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.analytics_succeeds {
            return Err(ProviderError::Network(format!(
                "{} metrics unavailable",
                platform
            )));
        }
        Ok(config.engagement)
    }

    async fn revoke_token(&self, platform: Platform, _token: &str) -> ProviderResult<()> {
        self.calls.revoke.fetch_add(1, Ordering::SeqCst);
        let config = self.snapshot();
        self.latency(&config).await;

        if !config.revoke_succeeds {
            return Err(ProviderError::Network(format!(
                "{} revocation endpoint unreachable",
                platform
            )));
        }
        Ok(())
    }
}
