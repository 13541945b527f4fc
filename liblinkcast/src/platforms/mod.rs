//! Supported platforms and their static configuration
//!
//! Every platform Linkcast can link accounts on has exactly one
//! [`PlatformConfig`] entry. The table is immutable for the lifetime of the
//! process and is consulted before every outbound post.
//!
//! # Examples
//!
//! ```
//! use liblinkcast::platforms::Platform;
//!
//! let platform: Platform = "twitter".parse().unwrap();
//! let config = platform.config();
//! assert_eq!(config.limits.characters_per_post, 280);
//! assert!(config.capabilities.can_post);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AccountError;

/// External social network an account can be linked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Twitter,
    Facebook,
    TikTok,
    LinkedIn,
    YouTube,
}

impl Platform {
    /// Every supported platform, in display order
    pub const ALL: [Platform; 6] = [
        Platform::Instagram,
        Platform::Twitter,
        Platform::Facebook,
        Platform::TikTok,
        Platform::LinkedIn,
        Platform::YouTube,
    ];

    /// Lowercase key used in storage, configuration and messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
            Platform::LinkedIn => "linkedin",
            Platform::YouTube => "youtube",
        }
    }

    /// Static configuration for this platform
    pub fn config(&self) -> &'static PlatformConfig {
        match self {
            Platform::Instagram => &INSTAGRAM,
            Platform::Twitter => &TWITTER,
            Platform::Facebook => &FACEBOOK,
            Platform::TikTok => &TIKTOK,
            Platform::LinkedIn => &LINKEDIN,
            Platform::YouTube => &YOUTUBE,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "twitter" | "x" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "tiktok" => Ok(Platform::TikTok),
            "linkedin" => Ok(Platform::LinkedIn),
            "youtube" => Ok(Platform::YouTube),
            _ => Err(AccountError::UnsupportedPlatform(s.to_string())),
        }
    }
}

/// What a platform allows an orchestrator to do
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Capabilities {
    pub can_post: bool,
    pub can_schedule: bool,
    pub can_analyze: bool,
    pub can_message: bool,
}

/// Numeric content and rate limits of a platform
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Limits {
    pub posts_per_hour: u32,
    pub posts_per_day: u32,
    pub characters_per_post: usize,
    pub images_per_post: usize,
}

/// Endpoint paths relative to [`PlatformConfig::api_base_url`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Endpoints {
    pub profile: &'static str,
    pub publish: &'static str,
    pub analytics: &'static str,
}

/// Static description of one platform
#[derive(Debug, Serialize)]
pub struct PlatformConfig {
    pub platform: Platform,
    pub name: &'static str,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub revoke_url: Option<&'static str>,
    pub api_base_url: &'static str,
    pub scopes: &'static [&'static str],
    pub requires_pkce: bool,
    pub endpoints: Endpoints,
    pub capabilities: Capabilities,
    pub limits: Limits,
    /// Access-token lifetime assumed when a provider omits `expires_in`
    pub default_token_ttl_secs: i64,
}

/// The static configuration table, one entry per platform
pub fn supported_platforms() -> impl Iterator<Item = &'static PlatformConfig> {
    Platform::ALL.iter().map(|p| p.config())
}

static INSTAGRAM: PlatformConfig = PlatformConfig {
    platform: Platform::Instagram,
    name: "Instagram",
    authorize_url: "https://api.instagram.com/oauth/authorize",
    token_url: "https://api.instagram.com/oauth/access_token",
    revoke_url: None,
    api_base_url: "https://graph.instagram.com/v18.0",
    scopes: &["instagram_basic", "instagram_content_publish"],
    requires_pkce: false,
    endpoints: Endpoints {
        profile: "/me",
        publish: "/me/media",
        analytics: "/me/insights",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: true,
        can_analyze: true,
        can_message: true,
    },
    limits: Limits {
        posts_per_hour: 25,
        posts_per_day: 100,
        characters_per_post: 2200,
        images_per_post: 10,
    },
    default_token_ttl_secs: 3600,
};

static TWITTER: PlatformConfig = PlatformConfig {
    platform: Platform::Twitter,
    name: "Twitter/X",
    authorize_url: "https://twitter.com/i/oauth2/authorize",
    token_url: "https://api.twitter.com/2/oauth2/token",
    revoke_url: Some("https://api.twitter.com/2/oauth2/revoke"),
    api_base_url: "https://api.twitter.com/2",
    scopes: &["tweet.read", "tweet.write", "users.read", "offline.access"],
    requires_pkce: true,
    endpoints: Endpoints {
        profile: "/users/me",
        publish: "/tweets",
        analytics: "/users/me/metrics",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: true,
        can_analyze: true,
        can_message: true,
    },
    limits: Limits {
        posts_per_hour: 50,
        posts_per_day: 300,
        characters_per_post: 280,
        images_per_post: 4,
    },
    default_token_ttl_secs: 7200,
};

static FACEBOOK: PlatformConfig = PlatformConfig {
    platform: Platform::Facebook,
    name: "Facebook",
    authorize_url: "https://www.facebook.com/v18.0/dialog/oauth",
    token_url: "https://graph.facebook.com/v18.0/oauth/access_token",
    revoke_url: None,
    api_base_url: "https://graph.facebook.com/v18.0",
    scopes: &["pages_manage_posts", "pages_read_engagement"],
    requires_pkce: false,
    endpoints: Endpoints {
        profile: "/me",
        publish: "/me/feed",
        analytics: "/me/insights",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: true,
        can_analyze: true,
        can_message: true,
    },
    limits: Limits {
        posts_per_hour: 50,
        posts_per_day: 200,
        characters_per_post: 63206,
        images_per_post: 10,
    },
    default_token_ttl_secs: 60 * 24 * 3600,
};

static TIKTOK: PlatformConfig = PlatformConfig {
    platform: Platform::TikTok,
    name: "TikTok",
    authorize_url: "https://www.tiktok.com/v2/auth/authorize/",
    token_url: "https://open.tiktokapis.com/v2/oauth/token/",
    revoke_url: Some("https://open.tiktokapis.com/v2/oauth/revoke/"),
    api_base_url: "https://open.tiktokapis.com/v2",
    scopes: &["user.info.basic", "video.publish"],
    requires_pkce: false,
    endpoints: Endpoints {
        profile: "/user/info/",
        publish: "/post/publish/video/init/",
        analytics: "/user/info/stats/",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: false,
        can_analyze: true,
        can_message: false,
    },
    limits: Limits {
        posts_per_hour: 10,
        posts_per_day: 50,
        characters_per_post: 150,
        images_per_post: 0,
    },
    default_token_ttl_secs: 24 * 3600,
};

static LINKEDIN: PlatformConfig = PlatformConfig {
    platform: Platform::LinkedIn,
    name: "LinkedIn",
    authorize_url: "https://www.linkedin.com/oauth/v2/authorization",
    token_url: "https://www.linkedin.com/oauth/v2/accessToken",
    revoke_url: Some("https://www.linkedin.com/oauth/v2/revoke"),
    api_base_url: "https://api.linkedin.com/v2",
    scopes: &["openid", "profile", "w_member_social"],
    requires_pkce: false,
    endpoints: Endpoints {
        profile: "/userinfo",
        publish: "/ugcPosts",
        analytics: "/organizationalEntityShareStatistics",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: true,
        can_analyze: true,
        can_message: false,
    },
    limits: Limits {
        posts_per_hour: 25,
        posts_per_day: 100,
        characters_per_post: 3000,
        images_per_post: 9,
    },
    default_token_ttl_secs: 60 * 24 * 3600,
};

static YOUTUBE: PlatformConfig = PlatformConfig {
    platform: Platform::YouTube,
    name: "YouTube",
    authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    revoke_url: Some("https://oauth2.googleapis.com/revoke"),
    api_base_url: "https://www.googleapis.com/youtube/v3",
    scopes: &[
        "https://www.googleapis.com/auth/youtube.upload",
        "https://www.googleapis.com/auth/youtube.readonly",
    ],
    requires_pkce: true,
    endpoints: Endpoints {
        profile: "/channels",
        publish: "/videos",
        analytics: "/channels/statistics",
    },
    capabilities: Capabilities {
        can_post: true,
        can_schedule: true,
        can_analyze: true,
        can_message: false,
    },
    limits: Limits {
        posts_per_hour: 10,
        posts_per_day: 50,
        characters_per_post: 5000,
        images_per_post: 1,
    },
    default_token_ttl_secs: 3600,
};
