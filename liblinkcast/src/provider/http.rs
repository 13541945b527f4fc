//! Generic OAuth2/REST provider over reqwest
//!
//! Token exchange, refresh and revocation are form-encoded POSTs to the
//! platform's OAuth endpoints. Profile, publish and analytics calls are
//! bearer-authenticated JSON requests to the endpoint paths of the platform
//! table. Response bodies are normalised leniently since every network
//! shapes them a little differently (`{"data": {...}}` envelopes, `sub`
//! instead of `id`, nested `public_metrics`).

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use super::{ProviderClient, ProviderResult};
use crate::config::{Config, ProviderCredentials};
use crate::error::ProviderError;
use crate::platforms::Platform;
use crate::types::{
    AccountMetrics, Engagement, ExternalProfile, PostContent, TokenGrant, Timeframe,
};

pub struct HttpProvider {
    client: Client,
    credentials: HashMap<String, ProviderCredentials>,
}

impl HttpProvider {
    /// Build a provider from the `[http]` and `[providers.*]` sections
    pub fn new(config: &Config) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            credentials: config.providers.clone(),
        })
    }

    fn credentials(&self, platform: Platform) -> ProviderResult<&ProviderCredentials> {
        self.credentials.get(platform.as_str()).ok_or_else(|| {
            ProviderError::Authentication(format!("No OAuth client configured for {}", platform))
        })
    }

    fn token_url(&self, platform: Platform) -> String {
        self.credentials
            .get(platform.as_str())
            .and_then(|c| c.token_url.clone())
            .unwrap_or_else(|| platform.config().token_url.to_string())
    }

    /// Absolute URL of an API path, honouring a configured base override
    fn endpoint_url(&self, platform: Platform, path: &str) -> String {
        let base = self
            .credentials
            .get(platform.as_str())
            .and_then(|c| c.api_base_url.as_deref())
            .unwrap_or(platform.config().api_base_url);
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn token_request(
        &self,
        platform: Platform,
        params: &[(&str, &str)],
    ) -> ProviderResult<TokenGrant> {
        let credentials = self.credentials(platform)?;
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("client_id", credentials.client_id.as_str()));
        form.push(("client_secret", credentials.client_secret.expose_secret()));

        let url = self.token_url(platform);
        tracing::debug!("POST {} ({})", url, platform);

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let body: TokenResponse = read_json(response, "token request").await?;
        body.into_grant(platform, chrono::Utc::now().timestamp())
    }

    async fn get_json(
        &self,
        platform: Platform,
        access_token: &str,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<Value> {
        let url = self.endpoint_url(platform, path);
        tracing::debug!("GET {} ({})", url, platform);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        read_json(response, context).await
    }
}

#[async_trait]
impl ProviderClient for HttpProvider {
    async fn exchange_code(
        &self,
        platform: Platform,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> ProviderResult<TokenGrant> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        self.token_request(platform, &params)
            .await
            .map_err(|e| ProviderError::TokenExchangeFailed(e.to_string()))
    }

    async fn refresh_token(
        &self,
        platform: Platform,
        refresh_token: &str,
    ) -> ProviderResult<TokenGrant> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.token_request(platform, &params)
            .await
            .map_err(|e| ProviderError::TokenRefreshFailed(e.to_string()))
    }

    async fn fetch_profile(
        &self,
        platform: Platform,
        access_token: &str,
    ) -> ProviderResult<ExternalProfile> {
        let path = platform.config().endpoints.profile;
        let body = self
            .get_json(platform, access_token, path, &[], "profile fetch")
            .await
            .map_err(|e| ProviderError::ProfileFetchFailed(e.to_string()))?;

        profile_from_json(&body).map_err(|e| ProviderError::ProfileFetchFailed(e.to_string()))
    }

    async fn publish(
        &self,
        platform: Platform,
        access_token: &str,
        content: &PostContent,
    ) -> ProviderResult<String> {
        let url = self.endpoint_url(platform, platform.config().endpoints.publish);
        tracing::debug!("POST {} ({})", url, platform);

        let payload = json!({
            "text": content.text,
            "media_urls": content.images,
            "video_url": content.video,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let body: Value = read_json(response, "publish").await?;
        post_id_from_json(&body)
    }

    async fn fetch_analytics(
        &self,
        platform: Platform,
        access_token: &str,
        timeframe: Timeframe,
    ) -> ProviderResult<AccountMetrics> {
        let path = platform.config().endpoints.analytics;
        let body = self
            .get_json(
                platform,
                access_token,
                path,
                &[("timeframe", timeframe.as_str())],
                "analytics",
            )
            .await?;

        serde_json::from_value(unwrap_data(&body).clone())
            .map_err(|e| ProviderError::Malformed(format!("analytics: {}", e)))
    }

    async fn fetch_engagement(
        &self,
        platform: Platform,
        access_token: &str,
        external_post_id: &str,
    ) -> ProviderResult<Engagement> {
        let path = format!(
            "{}/{}/metrics",
            platform.config().endpoints.publish.trim_end_matches('/'),
            external_post_id
        );
        let body = self
            .get_json(platform, access_token, &path, &[], "engagement")
            .await?;

        serde_json::from_value(unwrap_data(&body).clone())
            .map_err(|e| ProviderError::Malformed(format!("engagement: {}", e)))
    }

    async fn revoke_token(&self, platform: Platform, token: &str) -> ProviderResult<()> {
        let Some(url) = platform.config().revoke_url else {
            tracing::debug!("{} has no revocation endpoint, skipping", platform);
            return Ok(());
        };

        let credentials = self.credentials(platform)?;
        let form = [
            ("token", token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose_secret()),
        ];

        tracing::debug!("POST {} ({})", url, platform);
        let response = self
            .client
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_http_error(status.as_u16(), &body, "revocation"))
        }
    }
}

/// Token endpoint response (RFC 6749 section 5.1, plus `expires_at`)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_grant(self, platform: Platform, now: i64) -> ProviderResult<TokenGrant> {
        if self.access_token.is_empty() {
            return Err(ProviderError::Malformed(
                "token response without access_token".to_string(),
            ));
        }

        let expires_at = match (self.expires_in, self.expires_at) {
            (Some(secs), _) => now + secs,
            (None, Some(at)) => at,
            (None, None) => now + platform.config().default_token_ttl_secs,
        };

        Ok(TokenGrant {
            access_token: self.access_token.into(),
            refresh_token: self
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(Into::into),
            expires_at,
            scope: self.scope,
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> ProviderResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_error(status.as_u16(), &body, context));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Malformed(format!("{}: {}", context, e)))
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn map_http_error(status: u16, body: &str, context: &str) -> ProviderError {
    let detail = if body.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body.trim())
    };

    match status {
        401 | 403 => {
            ProviderError::Authentication(format!("{} was not authorized ({})", context, detail))
        }
        429 => ProviderError::RateLimit(format!("{} was throttled ({})", context, detail)),
        400 | 422 => ProviderError::Posting(format!("{} was rejected ({})", context, detail)),
        500..=599 => ProviderError::Network(format!("{} hit a server error ({})", context, detail)),
        _ => ProviderError::Malformed(format!("{} returned unexpected {}", context, detail)),
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Network(format!("Request timed out: {}", error))
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Strip a `{"data": {...}}` envelope if present
fn unwrap_data(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn profile_from_json(body: &Value) -> ProviderResult<ExternalProfile> {
    let data = unwrap_data(body);

    let external_id = string_field(data, &["id", "sub", "open_id"])
        .ok_or_else(|| ProviderError::Malformed("profile without id".to_string()))?;
    let display_name = string_field(data, &["name", "display_name"]);
    let username = string_field(data, &["username", "handle", "screen_name"])
        .or_else(|| display_name.clone())
        .unwrap_or_else(|| external_id.clone());

    let follower_count = data
        .get("followers_count")
        .or_else(|| data.get("follower_count"))
        .or_else(|| data.pointer("/public_metrics/followers_count"))
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let is_verified = data
        .get("verified")
        .or_else(|| data.get("is_verified"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(ExternalProfile {
        external_id,
        username,
        display_name,
        profile_url: string_field(data, &["profile_url", "url", "link"]),
        follower_count,
        is_verified,
    })
}

fn post_id_from_json(body: &Value) -> ProviderResult<String> {
    string_field(unwrap_data(body), &["id", "post_id", "publish_id"])
        .ok_or_else(|| ProviderError::Malformed("publish response without post id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_twitter_override() -> Config {
        Config::from_toml(
            r#"
            [database]
            path = "/tmp/unused.db"

            [providers.twitter]
            client_id = "client"
            client_secret = "secret"
            api_base_url = "http://localhost:9000/api/"
            token_url = "http://localhost:9000/token"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_map_http_error_statuses() {
        assert!(matches!(
            map_http_error(401, "", "publish"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            map_http_error(403, "forbidden", "publish"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            map_http_error(429, "", "publish"),
            ProviderError::RateLimit(_)
        ));
        assert!(matches!(
            map_http_error(400, "duplicate content", "publish"),
            ProviderError::Posting(_)
        ));
        assert!(matches!(
            map_http_error(422, "", "publish"),
            ProviderError::Posting(_)
        ));
        assert!(matches!(
            map_http_error(503, "", "publish"),
            ProviderError::Network(_)
        ));
        assert!(matches!(
            map_http_error(302, "", "publish"),
            ProviderError::Malformed(_)
        ));
    }

    #[test]
    fn test_map_http_error_keeps_body() {
        let error = map_http_error(400, " duplicate content ", "publish");
        assert_eq!(
            error.to_string(),
            "Posting failed: publish was rejected (HTTP 400: duplicate content)"
        );
    }

    #[test]
    fn test_token_response_with_expires_in() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":7200,"scope":"tweet.write","token_type":"bearer"}"#,
        )
        .unwrap();

        let grant = response.into_grant(Platform::Twitter, 1_000).unwrap();
        assert_eq!(grant.access_token.expose_secret(), "a");
        assert_eq!(grant.refresh_token.unwrap().expose_secret(), "r");
        assert_eq!(grant.expires_at, 8_200);
        assert_eq!(grant.scope.as_deref(), Some("tweet.write"));
    }

    #[test]
    fn test_token_response_fallbacks() {
        let absolute: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_at":5000}"#).unwrap();
        assert_eq!(absolute.into_grant(Platform::Twitter, 1_000).unwrap().expires_at, 5_000);

        let bare: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":""}"#).unwrap();
        let grant = bare.into_grant(Platform::YouTube, 1_000).unwrap();
        assert_eq!(grant.expires_at, 1_000 + 3600);
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn test_token_response_requires_access_token() {
        let empty: TokenResponse = serde_json::from_str(r#"{"access_token":""}"#).unwrap();
        assert!(matches!(
            empty.into_grant(Platform::Twitter, 0),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_profile_from_twitter_shape() {
        let body = json!({
            "data": {
                "id": "2244994945",
                "name": "Recruiting Desk",
                "username": "recruitdesk",
                "verified": true,
                "public_metrics": {"followers_count": 5120}
            }
        });

        let profile = profile_from_json(&body).unwrap();
        assert_eq!(profile.external_id, "2244994945");
        assert_eq!(profile.username, "recruitdesk");
        assert_eq!(profile.display_name.as_deref(), Some("Recruiting Desk"));
        assert_eq!(profile.follower_count, 5120);
        assert!(profile.is_verified);
    }

    #[test]
    fn test_profile_from_openid_shape() {
        let body = json!({"sub": "abc-42", "name": "Jordan Lee"});

        let profile = profile_from_json(&body).unwrap();
        assert_eq!(profile.external_id, "abc-42");
        assert_eq!(profile.username, "Jordan Lee");
        assert_eq!(profile.follower_count, 0);
        assert!(!profile.is_verified);
    }

    #[test]
    fn test_profile_without_id_is_malformed() {
        assert!(matches!(
            profile_from_json(&json!({"username": "ghost"})),
            Err(ProviderError::Malformed(_))
        ));
    }

    #[test]
    fn test_post_id_extraction() {
        assert_eq!(post_id_from_json(&json!({"data": {"id": "1460323737035677698"}})).unwrap(), "1460323737035677698");
        assert_eq!(post_id_from_json(&json!({"id": 17895695668004550_i64})).unwrap(), "17895695668004550");
        assert!(post_id_from_json(&json!({"ok": true})).is_err());
    }

    #[test]
    fn test_endpoint_overrides() {
        let provider = HttpProvider::new(&config_with_twitter_override()).unwrap();

        assert_eq!(
            provider.endpoint_url(Platform::Twitter, "/tweets"),
            "http://localhost:9000/api/tweets"
        );
        assert_eq!(provider.token_url(Platform::Twitter), "http://localhost:9000/token");
        assert_eq!(
            provider.endpoint_url(Platform::LinkedIn, "/ugcPosts"),
            "https://api.linkedin.com/v2/ugcPosts"
        );
        assert_eq!(
            provider.token_url(Platform::LinkedIn),
            "https://www.linkedin.com/oauth/v2/accessToken"
        );
    }

    #[tokio::test]
    async fn test_exchange_without_client_fails_before_network() {
        let provider = HttpProvider::new(&config_with_twitter_override()).unwrap();

        let result = provider
            .exchange_code(Platform::Instagram, "code", "https://app/callback", None)
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProviderError::TokenExchangeFailed(_)));
        assert!(err.to_string().contains("No OAuth client configured for instagram"));
    }

    #[tokio::test]
    async fn test_revoke_without_endpoint_is_noop() {
        let provider = HttpProvider::new(&config_with_twitter_override()).unwrap();
        provider
            .revoke_token(Platform::Instagram, "token")
            .await
            .unwrap();
    }
}
