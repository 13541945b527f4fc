//! Access to external platforms
//!
//! The service layer never talks HTTP itself. Everything it needs from a
//! platform goes through [`ProviderClient`], so the same orchestration runs
//! against [`HttpProvider`] in production and [`MockProvider`] in tests.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::platforms::Platform;
use crate::types::{AccountMetrics, Engagement, ExternalProfile, PostContent, TokenGrant, Timeframe};

pub mod http;
pub mod mock;

pub use http::HttpProvider;
pub use mock::{MockConfig, MockProvider};

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Exchange an authorization code for tokens
    ///
    /// `code_verifier` is sent when the authorization used PKCE.
    async fn exchange_code(
        &self,
        platform: Platform,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> ProviderResult<TokenGrant>;

    /// Obtain a new access token from a refresh token
    async fn refresh_token(&self, platform: Platform, refresh_token: &str)
        -> ProviderResult<TokenGrant>;

    /// Profile of the account that owns `access_token`
    async fn fetch_profile(&self, platform: Platform, access_token: &str)
        -> ProviderResult<ExternalProfile>;

    /// Publish content and return the platform's id for the new post
    async fn publish(
        &self,
        platform: Platform,
        access_token: &str,
        content: &PostContent,
    ) -> ProviderResult<String>;

    async fn fetch_analytics(
        &self,
        platform: Platform,
        access_token: &str,
        timeframe: Timeframe,
    ) -> ProviderResult<AccountMetrics>;

    async fn fetch_engagement(
        &self,
        platform: Platform,
        access_token: &str,
        external_post_id: &str,
    ) -> ProviderResult<Engagement>;

    /// Revoke a token; platforms without a revocation endpoint succeed
    async fn revoke_token(&self, platform: Platform, token: &str) -> ProviderResult<()>;
}
