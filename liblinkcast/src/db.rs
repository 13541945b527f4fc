//! SQLite storage for Linkcast

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::platforms::Platform;
use crate::storage::Storage;
use crate::types::{
    ConnectionStatus, Engagement, PlatformAccount, PostContent, PostRecord, PostStatus,
    ScheduleStatus, ScheduledPost,
};

const ACCOUNT_COLUMNS: &str = r#"
    id, user_id, platform, username, display_name, profile_url, follower_count,
    is_verified, access_token, refresh_token, token_expiry, scope, is_active,
    last_sync, connection_status, created_at, updated_at
"#;

const POST_COLUMNS: &str = r#"
    id, account_id, platform, text, image_urls, video_url, external_post_id,
    status, error_message, created_at, published_at, likes, comments, shares, views
"#;

const SCHEDULE_COLUMNS: &str = r#"
    id, account_id, content, fire_at, status, post_id, last_error, created_at
"#;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        tracing::debug!("Opened database at {}", expanded_path);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn parse_platform(value: &str) -> Result<Platform> {
    value
        .parse()
        .map_err(|_| DbError::CorruptRow(format!("unknown platform '{}'", value)).into())
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value.map(SecretString::from)
}

fn account_from_row(r: &SqliteRow) -> Result<PlatformAccount> {
    let connection_status = r
        .get::<String, _>("connection_status")
        .parse::<ConnectionStatus>()
        .map_err(DbError::CorruptRow)?;

    Ok(PlatformAccount {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: parse_platform(&r.get::<String, _>("platform"))?,
        username: r.get("username"),
        display_name: r.get("display_name"),
        profile_url: r.get("profile_url"),
        follower_count: r.get("follower_count"),
        is_verified: r.get::<i64, _>("is_verified") != 0,
        access_token: secret(r.get("access_token")),
        refresh_token: secret(r.get("refresh_token")),
        token_expiry: r.get("token_expiry"),
        scope: r.get("scope"),
        is_active: r.get::<i64, _>("is_active") != 0,
        last_sync: r.get("last_sync"),
        connection_status,
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn post_from_row(r: &SqliteRow) -> Result<PostRecord> {
    let status = r
        .get::<String, _>("status")
        .parse::<PostStatus>()
        .map_err(DbError::CorruptRow)?;
    let image_urls: Vec<String> = serde_json::from_str(&r.get::<String, _>("image_urls"))
        .map_err(|e| DbError::CorruptRow(format!("image_urls: {}", e)))?;

    Ok(PostRecord {
        id: r.get("id"),
        account_id: r.get("account_id"),
        platform: parse_platform(&r.get::<String, _>("platform"))?,
        text: r.get("text"),
        image_urls,
        video_url: r.get("video_url"),
        external_post_id: r.get("external_post_id"),
        status,
        error_message: r.get("error_message"),
        created_at: r.get("created_at"),
        published_at: r.get("published_at"),
        engagement: Engagement {
            likes: r.get("likes"),
            comments: r.get("comments"),
            shares: r.get("shares"),
            views: r.get("views"),
        },
    })
}

fn scheduled_from_row(r: &SqliteRow) -> Result<ScheduledPost> {
    let status = r
        .get::<String, _>("status")
        .parse::<ScheduleStatus>()
        .map_err(DbError::CorruptRow)?;
    let content: PostContent = serde_json::from_str(&r.get::<String, _>("content"))
        .map_err(|e| DbError::CorruptRow(format!("scheduled content: {}", e)))?;

    Ok(ScheduledPost {
        id: r.get("id"),
        account_id: r.get("account_id"),
        content,
        fire_at: r.get("fire_at"),
        status,
        post_id: r.get("post_id"),
        last_error: r.get("last_error"),
        created_at: r.get("created_at"),
    })
}

#[async_trait]
impl Storage for Database {
    async fn create_account(&self, account: &PlatformAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_accounts (
                id, user_id, platform, username, display_name, profile_url,
                follower_count, is_verified, access_token, refresh_token,
                token_expiry, scope, is_active, last_sync, connection_status,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(account.platform.as_str())
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.profile_url)
        .bind(account.follower_count)
        .bind(account.is_verified)
        .bind(account.access_token.as_ref().map(|t| t.expose_secret()))
        .bind(account.refresh_token.as_ref().map(|t| t.expose_secret()))
        .bind(account.token_expiry)
        .bind(&account.scope)
        .bind(account.is_active)
        .bind(account.last_sync)
        .bind(account.connection_status.as_str())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM platform_accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_user_accounts(&self, user_id: &str) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM platform_accounts
             WHERE user_id = ? AND is_active = 1
             ORDER BY created_at ASC, id ASC",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(account_from_row).collect()
    }

    async fn find_active_account(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<PlatformAccount>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM platform_accounts
             WHERE user_id = ? AND platform = ? AND is_active = 1",
            ACCOUNT_COLUMNS
        ))
        .bind(user_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn update_account(&self, account: &PlatformAccount) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            UPDATE platform_accounts SET
                username = ?, display_name = ?, profile_url = ?, follower_count = ?,
                is_verified = ?, access_token = ?, refresh_token = ?, token_expiry = ?,
                scope = ?, is_active = ?, last_sync = ?, connection_status = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.username)
        .bind(&account.display_name)
        .bind(&account.profile_url)
        .bind(account.follower_count)
        .bind(account.is_verified)
        .bind(account.access_token.as_ref().map(|t| t.expose_secret()))
        .bind(account.refresh_token.as_ref().map(|t| t.expose_secret()))
        .bind(account.token_expiry)
        .bind(&account.scope)
        .bind(account.is_active)
        .bind(account.last_sync)
        .bind(account.connection_status.as_str())
        .bind(now)
        .bind(&account.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn deactivate_account(&self, account_id: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE platform_accounts SET
                is_active = 0, access_token = NULL, refresh_token = NULL,
                token_expiry = NULL, updated_at = ?
            WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_post(&self, record: &PostRecord) -> Result<()> {
        let image_urls = serde_json::to_string(&record.image_urls)
            .map_err(|e| DbError::CorruptRow(format!("image_urls: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO post_records (
                id, account_id, platform, text, image_urls, video_url,
                external_post_id, status, error_message, created_at, published_at,
                likes, comments, shares, views
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.account_id)
        .bind(record.platform.as_str())
        .bind(&record.text)
        .bind(image_urls)
        .bind(&record.video_url)
        .bind(&record.external_post_id)
        .bind(record.status.as_str())
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.published_at)
        .bind(record.engagement.likes)
        .bind(record.engagement.comments)
        .bind(record.engagement.shares)
        .bind(record.engagement.views)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Option<PostRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM post_records WHERE id = ?",
            POST_COLUMNS
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn get_account_posts(&self, account_id: &str, limit: usize) -> Result<Vec<PostRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM post_records
             WHERE account_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
            POST_COLUMNS
        ))
        .bind(account_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    async fn finish_post(&self, record: &PostRecord) -> Result<()> {
        if !PostStatus::Pending.can_transition_to(record.status) {
            return Err(DbError::InvalidTransition(format!(
                "post {} cannot become {}",
                record.id, record.status
            ))
            .into());
        }

        let result = sqlx::query(
            r#"
            UPDATE post_records SET
                status = ?, external_post_id = ?, error_message = ?, published_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(record.status.as_str())
        .bind(&record.external_post_id)
        .bind(&record.error_message)
        .bind(record.published_at)
        .bind(&record.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(DbError::InvalidTransition(format!(
                "post {} is not pending",
                record.id
            ))
            .into());
        }

        Ok(())
    }

    async fn update_post_engagement(&self, post_id: &str, engagement: Engagement) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE post_records SET likes = ?, comments = ?, shares = ?, views = ?
            WHERE id = ?
            "#,
        )
        .bind(engagement.likes)
        .bind(engagement.comments)
        .bind(engagement.shares)
        .bind(engagement.views)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn enqueue(&self, entry: &ScheduledPost) -> Result<()> {
        let content = serde_json::to_string(&entry.content)
            .map_err(|e| DbError::CorruptRow(format!("scheduled content: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO scheduled_posts (
                id, account_id, content, fire_at, status, post_id, last_error, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.account_id)
        .bind(content)
        .bind(entry.fire_at)
        .bind(entry.status.as_str())
        .bind(&entry.post_id)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_scheduled(&self, entry_id: &str) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM scheduled_posts WHERE id = ?",
            SCHEDULE_COLUMNS
        ))
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(scheduled_from_row).transpose()
    }

    async fn due_scheduled(&self, now: i64) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_posts
             WHERE status = 'queued' AND fire_at <= ?
             ORDER BY fire_at ASC, created_at ASC",
            SCHEDULE_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(scheduled_from_row).collect()
    }

    async fn queued_posts(&self, account_id: Option<&str>) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_posts
             WHERE status = 'queued' AND (? IS NULL OR account_id = ?)
             ORDER BY fire_at ASC, created_at ASC",
            SCHEDULE_COLUMNS
        ))
        .bind(account_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(scheduled_from_row).collect()
    }

    async fn finish_scheduled(
        &self,
        entry_id: &str,
        status: ScheduleStatus,
        post_id: Option<&str>,
        error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = ?, post_id = ?, last_error = ?
            WHERE id = ? AND status = 'queued'
            "#,
        )
        .bind(status.as_str())
        .bind(post_id)
        .bind(error)
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_account_schedule(&self, account_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_posts SET status = 'cancelled'
            WHERE account_id = ? AND status = 'queued'
            "#,
        )
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    async fn window_count(
        &self,
        account_id: &str,
        window_secs: i64,
        window_start: i64,
    ) -> Result<u32> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT post_count FROM rate_limits
            WHERE account_id = ? AND window_secs = ? AND window_start = ?
            "#,
        )
        .bind(account_id)
        .bind(window_secs)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| r.0).unwrap_or(0) as u32)
    }

    async fn increment_window(
        &self,
        account_id: &str,
        window_secs: i64,
        window_start: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_limits (account_id, window_secs, window_start, post_count)
            VALUES (?, ?, ?, 1)
            ON CONFLICT(account_id, window_secs, window_start)
            DO UPDATE SET post_count = post_count + 1
            "#,
        )
        .bind(account_id)
        .bind(window_secs)
        .bind(window_start)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn delete_windows_before(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE window_start < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }
}
