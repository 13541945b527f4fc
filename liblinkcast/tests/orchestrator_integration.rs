//! End-to-end orchestration tests against a temporary SQLite database and
//! the in-process mock provider

use anyhow::Result;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use liblinkcast::error::{AccountError, ConfigError, LinkcastError, ProviderError};
use liblinkcast::provider::{MockConfig, MockProvider, ProviderClient};
use liblinkcast::service::events::Event;
use liblinkcast::{
    Config, ConnectionStatus, Database, LinkcastService, Platform, PostContent, PostStatus,
    Storage, Timeframe,
};

const USER: &str = "user-1";
const REDIRECT: &str = "https://app/callback";

struct Harness {
    _temp_dir: TempDir,
    service: LinkcastService,
    provider: Arc<MockProvider>,
}

async fn harness_with(provider: MockProvider, extra_config: &str) -> Result<Harness> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("linkcast.db");
    let config = Config::from_toml(&format!(
        "[database]\npath = \"{}\"\n{}\n",
        db_path.display().to_string().replace('\\', "/"),
        extra_config
    ))?;

    let db = Database::new(&config.database.path).await?;
    let provider = Arc::new(provider);
    let service = LinkcastService::with_components(
        Arc::new(db),
        Arc::clone(&provider) as Arc<dyn ProviderClient>,
        config,
    );

    Ok(Harness {
        _temp_dir: temp_dir,
        service,
        provider,
    })
}

async fn harness() -> Result<Harness> {
    harness_with(MockProvider::success(), "[dispatch]\nbulk_delay_ms = 0").await
}

async fn connect(h: &Harness, platform: &str) -> Result<String> {
    let account = h
        .service
        .accounts()
        .connect_account(USER, platform, "abc123", REDIRECT)
        .await?;
    Ok(account.id)
}

/// Push an account's token expiry into the past
async fn expire_token(h: &Harness, account_id: &str) -> Result<i64> {
    let mut account = h.service.accounts().get_account(account_id).await?;
    let expired_at = chrono::Utc::now().timestamp() - 60;
    account.token_expiry = Some(expired_at);
    h.service.storage().update_account(&account).await?;
    Ok(expired_at)
}

// ============================================================================
// Connection
// ============================================================================

#[tokio::test]
async fn test_connect_then_list_includes_connected_account() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "twitter").await?;

    let accounts = h.service.accounts().get_user_accounts(USER).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, id);
    assert_eq!(accounts[0].platform, Platform::Twitter);
    assert_eq!(accounts[0].connection_status, ConnectionStatus::Connected);
    assert_eq!(accounts[0].username, "twitter_user");
    assert!(accounts[0].access_token.is_some());
    Ok(())
}

#[tokio::test]
async fn test_twitter_over_limit_scenario() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "twitter").await?;

    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("a".repeat(281)))
        .await;

    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Content exceeds twitter character limit")
    );
    assert!(outcome.post_id.is_none());
    assert_eq!(h.provider.publish_calls(), 0);
    assert!(h.service.analytics().post_history(&id, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_exactly_at_limit_is_published() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "twitter").await?;

    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("é".repeat(280)))
        .await;

    assert!(outcome.success, "{:?}", outcome.error);
    Ok(())
}

#[tokio::test]
async fn test_unsupported_platform_makes_no_provider_call() -> Result<()> {
    let h = harness().await?;

    let err = h
        .service
        .accounts()
        .connect_account(USER, "myspace", "abc123", REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkcastError::Account(AccountError::UnsupportedPlatform(_))
    ));
    assert_eq!(h.provider.total_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_connection_rejected_by_default() -> Result<()> {
    let h = harness().await?;
    connect(&h, "instagram").await?;

    let err = h
        .service
        .accounts()
        .connect_account(USER, "instagram", "second-code", REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkcastError::Account(AccountError::AlreadyConnected { .. })
    ));
    assert_eq!(h.provider.exchange_calls(), 1);

    // Another platform is fine
    connect(&h, "facebook").await?;
    assert_eq!(h.service.accounts().get_user_accounts(USER).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_connection_replaces_when_configured() -> Result<()> {
    let h = harness_with(
        MockProvider::success(),
        "[dispatch]\nbulk_delay_ms = 0\non_duplicate = \"replace\"",
    )
    .await?;
    let first = connect(&h, "linkedin").await?;
    let second = connect(&h, "linkedin").await?;

    assert_ne!(first, second);
    let accounts = h.service.accounts().get_user_accounts(USER).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, second);

    let old = h.service.storage().get_account(&first).await?.unwrap();
    assert!(!old.is_active);
    assert_eq!(h.provider.revoke_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_code_stores_nothing() -> Result<()> {
    let h = harness().await?;
    h.provider.configure(|c| c.exchange_succeeds = false);

    let err = h
        .service
        .accounts()
        .connect_account(USER, "youtube", "bad", REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkcastError::Provider(ProviderError::TokenExchangeFailed(_))
    ));
    assert!(h.service.accounts().get_user_accounts(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_profile_failure_stores_nothing_and_revokes() -> Result<()> {
    let h = harness().await?;
    h.provider.configure(|c| c.profile_succeeds = false);

    let err = h
        .service
        .accounts()
        .connect_account(USER, "twitter", "abc123", REDIRECT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkcastError::Provider(ProviderError::ProfileFetchFailed(_))
    ));
    assert!(h.service.accounts().get_user_accounts(USER).await?.is_empty());
    assert_eq!(h.provider.revoke_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_manual_account_cannot_post_until_connected() -> Result<()> {
    let h = harness().await?;
    let account = h
        .service
        .accounts()
        .connect_manual(USER, "instagram", "@hoops_academy", None)
        .await?;

    assert_eq!(account.connection_status, ConnectionStatus::Pending);
    assert_eq!(account.username, "hoops_academy");

    let outcome = h
        .service
        .posting()
        .post_to_account(&account.id, &PostContent::text("Tryouts next week"))
        .await;
    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("has no credentials"));
    assert_eq!(h.provider.total_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_oauth_connection_supersedes_manual_record() -> Result<()> {
    let h = harness().await?;
    let manual = h
        .service
        .accounts()
        .connect_manual(USER, "youtube", "channel", None)
        .await?;

    let connected = connect(&h, "youtube").await?;

    let accounts = h.service.accounts().get_user_accounts(USER).await?;
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].id, connected);
    assert!(!h.service.storage().get_account(&manual.id).await?.unwrap().is_active);
    // Nothing to revoke for a record without tokens
    assert_eq!(h.provider.revoke_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_authorization_flow_with_pkce() -> Result<()> {
    let h = harness_with(
        MockProvider::success(),
        "[providers.twitter]\nclient_id = \"client-1\"\nclient_secret = \"secret\"",
    )
    .await?;
    let accounts = h.service.accounts();

    let request = accounts.authorization_request(Platform::Twitter, REDIRECT)?;
    assert!(request.url.contains("client_id=client-1"));
    assert!(request.code_verifier.is_some());

    let err = accounts
        .complete_authorization(USER, &request, "abc123", "forged-state")
        .await
        .unwrap_err();
    assert!(matches!(err, LinkcastError::InvalidInput(_)));
    assert_eq!(h.provider.exchange_calls(), 0);

    let account = accounts
        .complete_authorization(USER, &request, "abc123", &request.state)
        .await?;
    assert_eq!(account.connection_status, ConnectionStatus::Connected);

    let missing = accounts.authorization_request(Platform::TikTok, REDIRECT);
    assert!(matches!(
        missing,
        Err(LinkcastError::Config(ConfigError::MissingClient(_)))
    ));
    Ok(())
}

// ============================================================================
// Token refresh
// ============================================================================

#[tokio::test]
async fn test_expired_without_refresh_token_returns_false() -> Result<()> {
    let h = harness().await?;
    h.provider.configure(|c| c.issue_refresh_token = false);
    let id = connect(&h, "tiktok").await?;
    expire_token(&h, &id).await?;

    let mut account = h.service.accounts().get_account(&id).await?;
    let before = account.access_token.clone().unwrap();

    let refreshed = h.service.accounts().refresh_token_if_needed(&mut account).await?;

    assert!(!refreshed);
    assert_eq!(
        account.access_token.as_ref().unwrap().expose_secret(),
        before.expose_secret()
    );
    assert_eq!(h.provider.refresh_calls(), 0);

    let stored = h.service.accounts().get_account(&id).await?;
    assert_eq!(stored.connection_status, ConnectionStatus::Connected);
    Ok(())
}

#[tokio::test]
async fn test_expired_with_refresh_token_extends_expiry() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "youtube").await?;
    let old_expiry = expire_token(&h, &id).await?;

    let mut account = h.service.accounts().get_account(&id).await?;
    let old_token = account.access_token.clone().unwrap();

    assert!(h.service.accounts().refresh_token_if_needed(&mut account).await?);
    assert!(account.token_expiry.unwrap() > old_expiry);
    assert_ne!(
        account.access_token.as_ref().unwrap().expose_secret(),
        old_token.expose_secret()
    );

    let stored = h.service.accounts().get_account(&id).await?;
    assert_eq!(stored.token_expiry, account.token_expiry);
    assert_eq!(stored.connection_status, ConnectionStatus::Connected);
    Ok(())
}

#[tokio::test]
async fn test_valid_token_is_not_refreshed() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "facebook").await?;
    let mut account = h.service.accounts().get_account(&id).await?;

    assert!(h.service.accounts().refresh_token_if_needed(&mut account).await?);
    assert_eq!(h.provider.refresh_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_rejected_refresh_marks_account_expired() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "linkedin").await?;
    expire_token(&h, &id).await?;
    h.provider.configure(|c| c.refresh_succeeds = false);

    let mut account = h.service.accounts().get_account(&id).await?;
    let err = h
        .service
        .accounts()
        .refresh_token_if_needed(&mut account)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LinkcastError::Provider(ProviderError::TokenRefreshFailed(_))
    ));
    let stored = h.service.accounts().get_account(&id).await?;
    assert_eq!(stored.connection_status, ConnectionStatus::Expired);
    Ok(())
}

#[tokio::test]
async fn test_sync_updates_profile() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "twitter").await?;
    h.provider.configure(|c| {
        c.profile_username = Some("coach_k".to_string());
        c.follower_count = 9000;
    });

    let synced = h.service.accounts().sync_account(&id).await?;
    assert_eq!(synced.username, "coach_k");
    assert_eq!(synced.follower_count, 9000);

    h.provider.configure(|c| c.profile_succeeds = false);
    assert!(h.service.accounts().sync_account(&id).await.is_err());
    let stored = h.service.accounts().get_account(&id).await?;
    assert_eq!(stored.connection_status, ConnectionStatus::Error);
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_successful_post_is_recorded() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "linkedin").await?;

    let content = PostContent::text("Signing day recap")
        .with_images(vec!["https://cdn.example/1.jpg".to_string()]);
    let outcome = h.service.posting().post_to_account(&id, &content).await;

    assert!(outcome.success);
    let record = h
        .service
        .storage()
        .get_post(outcome.post_id.as_deref().unwrap())
        .await?
        .unwrap();
    assert_eq!(record.status, PostStatus::Published);
    assert_eq!(record.external_post_id, outcome.external_post_id);
    assert_eq!(record.image_urls.len(), 1);
    assert_eq!(record.engagement, Default::default());
    assert!(record.published_at.is_some());
    assert_eq!(
        h.provider.published(),
        vec![(Platform::LinkedIn, "Signing day recap".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn test_provider_failure_is_recorded_verbatim() -> Result<()> {
    let h = harness_with(
        MockProvider::publish_fails_on(Platform::Instagram, "media container not ready"),
        "[dispatch]\nbulk_delay_ms = 0",
    )
    .await?;
    let id = connect(&h, "instagram").await?;

    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("Highlights"))
        .await;

    assert!(!outcome.success);
    let error = outcome.error.clone().unwrap();
    assert_eq!(error, "Provider error: Posting failed: media container not ready");

    let record = h
        .service
        .storage()
        .get_post(outcome.post_id.as_deref().unwrap())
        .await?
        .unwrap();
    assert_eq!(record.status, PostStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(error.as_str()));
    assert_eq!(h.provider.publish_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_precondition_failures_create_no_records() -> Result<()> {
    let h = harness().await?;
    let twitter = connect(&h, "twitter").await?;
    let tiktok = connect(&h, "tiktok").await?;
    let posting = h.service.posting();

    let empty = posting.post_to_account(&twitter, &PostContent::text("   ")).await;
    assert_eq!(empty.error.as_deref(), Some("Content cannot be empty"));

    let images = (0..5).map(|i| format!("https://cdn.example/{}.jpg", i)).collect();
    let too_many = posting
        .post_to_account(&twitter, &PostContent::text("Gallery").with_images(images))
        .await;
    assert_eq!(
        too_many.error.as_deref(),
        Some("Too many images for twitter: 5 (max 4)")
    );

    let future = chrono::Utc::now().timestamp() + 3600;
    let scheduled = posting
        .post_to_account(&tiktok, &PostContent::text("Later").scheduled_at(future))
        .await;
    assert_eq!(
        scheduled.error.as_deref(),
        Some("Scheduling is not supported on tiktok")
    );

    let unknown = posting.post_to_account("nope", &PostContent::text("Hi")).await;
    assert_eq!(unknown.error.as_deref(), Some("Account not found: nope"));
    assert!(unknown.platform.is_none());

    assert_eq!(h.provider.publish_calls(), 0);
    assert!(h.service.analytics().post_history(&twitter, 10).await?.is_empty());
    assert!(h.service.analytics().post_history(&tiktok, 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_expired_token_without_refresh_fails_post() -> Result<()> {
    let h = harness().await?;
    h.provider.configure(|c| c.issue_refresh_token = false);
    let id = connect(&h, "facebook").await?;
    expire_token(&h, &id).await?;

    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("Practice moved"))
        .await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("has expired"));
    let stored = h.service.accounts().get_account(&id).await?;
    assert_eq!(stored.connection_status, ConnectionStatus::Expired);
    assert_eq!(h.provider.publish_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_refreshed_before_posting() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "youtube").await?;
    expire_token(&h, &id).await?;

    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("New highlight reel"))
        .await;

    assert!(outcome.success, "{:?}", outcome.error);
    assert_eq!(h.provider.refresh_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_hourly_rate_limit() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "tiktok").await?;
    let posting = h.service.posting();

    for i in 0..10 {
        let outcome = posting
            .post_to_account(&id, &PostContent::text(format!("clip {}", i)))
            .await;
        assert!(outcome.success, "post {} failed: {:?}", i, outcome.error);
    }

    let limited = posting
        .post_to_account(&id, &PostContent::text("one more"))
        .await;
    assert_eq!(
        limited.error.as_deref(),
        Some("Rate limit reached for tiktok: 10 posts per hour")
    );
    assert_eq!(h.provider.publish_calls(), 10);
    Ok(())
}

#[tokio::test]
async fn test_failed_publish_does_not_count_against_rate_window() -> Result<()> {
    let h = harness_with(
        MockProvider::publish_fails_on(Platform::TikTok, "upload failed"),
        "[dispatch]\nbulk_delay_ms = 0",
    )
    .await?;
    let id = connect(&h, "tiktok").await?;

    for _ in 0..12 {
        h.service
            .posting()
            .post_to_account(&id, &PostContent::text("clip"))
            .await;
    }

    // Every attempt reached the provider; none was rate limited
    assert_eq!(h.provider.publish_calls(), 12);
    Ok(())
}

// ============================================================================
// Bulk dispatch
// ============================================================================

#[tokio::test]
async fn test_bulk_with_one_provider_failure() -> Result<()> {
    let h = harness_with(
        MockProvider::publish_fails_on(Platform::Instagram, "media rejected"),
        "[dispatch]\nbulk_delay_ms = 0",
    )
    .await?;
    let ids = vec![
        connect(&h, "twitter").await?,
        connect(&h, "instagram").await?,
        connect(&h, "linkedin").await?,
    ];

    let bulk = h
        .service
        .posting()
        .post_to_multiple_accounts(&ids, &PostContent::text("Game day!"))
        .await;

    assert!(bulk.success);
    assert_eq!(bulk.results.len(), 3);
    for (result, id) in bulk.results.iter().zip(&ids) {
        assert_eq!(&result.account_id, id);
    }
    assert_eq!(bulk.results.iter().filter(|r| !r.success).count(), 1);
    assert!(!bulk.results[1].success);
    Ok(())
}

#[tokio::test]
async fn test_bulk_all_failing_is_not_success() -> Result<()> {
    let h = harness().await?;
    let ids = vec!["ghost-1".to_string(), "ghost-2".to_string()];

    let bulk = h
        .service
        .posting()
        .post_to_multiple_accounts(&ids, &PostContent::text("Anyone?"))
        .await;

    assert!(!bulk.success);
    assert_eq!(bulk.results.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_bulk_waits_between_dispatches() -> Result<()> {
    let h = harness_with(MockProvider::success(), "[dispatch]\nbulk_delay_ms = 50").await?;
    let ids = vec![
        connect(&h, "twitter").await?,
        connect(&h, "facebook").await?,
        connect(&h, "linkedin").await?,
    ];

    let start = Instant::now();
    let bulk = h
        .service
        .posting()
        .post_to_multiple_accounts(&ids, &PostContent::text("Camp dates"))
        .await;

    assert!(bulk.results.iter().all(|r| r.success));
    assert!(start.elapsed() >= Duration::from_millis(100));
    Ok(())
}

#[tokio::test]
async fn test_bulk_is_sequential() -> Result<()> {
    let h = harness_with(
        MockProvider::new(MockConfig {
            delay: Duration::from_millis(30),
            ..Default::default()
        }),
        "[dispatch]\nbulk_delay_ms = 0",
    )
    .await?;
    let ids = vec![connect(&h, "twitter").await?, connect(&h, "facebook").await?];

    let start = Instant::now();
    h.service
        .posting()
        .post_to_multiple_accounts(&ids, &PostContent::text("One at a time"))
        .await;

    // Two publishes that could not overlap
    assert!(start.elapsed() >= Duration::from_millis(60));
    Ok(())
}

// ============================================================================
// Disconnection
// ============================================================================

#[tokio::test]
async fn test_disconnect_keeps_post_records() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "twitter").await?;
    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("Farewell post"))
        .await;
    assert!(outcome.success);

    assert!(h.service.accounts().disconnect_account(USER, &id).await?);
    assert!(!h.service.accounts().disconnect_account(USER, &id).await?);

    let records = h.service.analytics().post_history(&id, 10).await?;
    assert_eq!(records.len(), 1);

    let stored = h.service.storage().get_account(&id).await?.unwrap();
    assert!(!stored.is_active);
    assert!(stored.access_token.is_none());
    assert!(h.service.accounts().get_user_accounts(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_disconnect_checks_ownership() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "facebook").await?;

    let err = h
        .service
        .accounts()
        .disconnect_account("someone-else", &id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LinkcastError::Account(AccountError::Unauthorized { .. })
    ));
    assert_eq!(err.exit_code(), 2);

    let missing = h
        .service
        .accounts()
        .disconnect_account(USER, "missing")
        .await
        .unwrap_err();
    assert!(matches!(
        missing,
        LinkcastError::Account(AccountError::NotFound(_))
    ));

    assert!(h.service.accounts().get_account(&id).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_disconnect_survives_revocation_failure() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "linkedin").await?;
    h.provider.configure(|c| c.revoke_succeeds = false);

    assert!(h.service.accounts().disconnect_account(USER, &id).await?);
    assert_eq!(h.provider.revoke_calls(), 1);
    Ok(())
}

// ============================================================================
// Analytics
// ============================================================================

#[tokio::test]
async fn test_analytics_success_and_fallback() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "instagram").await?;
    let analytics = h.service.analytics();

    let metrics = analytics.get_account_analytics(&id, Timeframe::Week).await?;
    assert_eq!(metrics.followers, 250);

    h.provider.configure(|c| c.analytics_succeeds = false);
    let zeroed = analytics.get_account_analytics(&id, Timeframe::Month).await?;
    assert_eq!(zeroed, Default::default());

    let unknown = analytics
        .get_account_analytics("missing", Timeframe::Day)
        .await;
    assert!(matches!(
        unknown,
        Err(LinkcastError::Account(AccountError::NotFound(_)))
    ));
    Ok(())
}

#[tokio::test]
async fn test_analytics_zeroed_when_refresh_fails() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "youtube").await?;
    expire_token(&h, &id).await?;
    h.provider.configure(|c| c.refresh_succeeds = false);

    let metrics = h
        .service
        .analytics()
        .get_account_analytics(&id, Timeframe::Year)
        .await?;

    assert_eq!(metrics, Default::default());
    assert_eq!(h.provider.analytics_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_refresh_post_engagement() -> Result<()> {
    let h = harness().await?;
    let id = connect(&h, "facebook").await?;
    let outcome = h
        .service
        .posting()
        .post_to_account(&id, &PostContent::text("Season opener"))
        .await;
    let post_id = outcome.post_id.unwrap();

    let engagement = h.service.analytics().refresh_post_engagement(&post_id).await?;
    assert_eq!(engagement.likes, 10);

    let stored = h.service.storage().get_post(&post_id).await?.unwrap();
    assert_eq!(stored.engagement, engagement);

    // Provider down: stored counters come back unchanged
    h.provider.configure(|c| c.analytics_succeeds = false);
    let unchanged = h.service.analytics().refresh_post_engagement(&post_id).await?;
    assert_eq!(unchanged, engagement);
    Ok(())
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_events_for_connect_and_post() -> Result<()> {
    let h = harness().await?;
    let mut events = h.service.subscribe();

    let id = connect(&h, "twitter").await?;
    h.service
        .posting()
        .post_to_account(&id, &PostContent::text("Hello"))
        .await;

    assert!(matches!(
        events.recv().await?,
        Event::AccountConnected { platform: Platform::Twitter, .. }
    ));
    assert!(matches!(events.recv().await?, Event::PostingStarted { .. }));
    assert!(matches!(events.recv().await?, Event::PostingCompleted { .. }));
    Ok(())
}
