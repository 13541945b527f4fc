//! link-accounts - Manage linked social platform accounts
//!
//! Walks a user through OAuth, records accounts by hand, and inspects,
//! refreshes or disconnects what is already linked.

use anyhow::Result;
use clap::{Parser, Subcommand};
use liblinkcast::platforms::PlatformConfig;
use liblinkcast::types::AccountSummary;
use liblinkcast::{Config, LinkcastError, LinkcastService, Platform, PlatformAccount, Timeframe};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "link-accounts")]
#[command(version)]
#[command(about = "Manage linked social platform accounts")]
#[command(long_about = "\
link-accounts - Manage linked social platform accounts

DESCRIPTION:
    Connects accounts on Instagram, Twitter, Facebook, TikTok, LinkedIn and
    YouTube through OAuth, and lists, refreshes, syncs or disconnects them.

USAGE EXAMPLES:
    # Show supported platforms and their limits
    link-accounts platforms

    # Start an OAuth flow, then finish it with the returned code
    link-accounts authorize twitter --redirect-uri https://app/callback
    link-accounts connect twitter --code abc123 --redirect-uri https://app/callback \\
        --code-verifier <VERIFIER>

    # Record an account before OAuth is available
    link-accounts manual instagram @hoops_academy

    # Inspect linked accounts
    link-accounts list --format json
    link-accounts analytics <ACCOUNT_ID> --timeframe month

    # Remove an account (post history is kept)
    link-accounts disconnect <ACCOUNT_ID>

CONFIGURATION:
    Configuration file: ~/.config/linkcast/config.toml
    Override with LINKCAST_CONFIG. OAuth clients live under [providers.<platform>].

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Authentication or authorization error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// User that owns the accounts
    #[arg(short, long, global = true, env = "LINKCAST_USER", default_value = "default")]
    user: String,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List supported platforms with their limits
    Platforms,

    /// Print the authorization URL for a platform
    Authorize {
        /// Platform key (instagram, twitter, facebook, tiktok, linkedin, youtube)
        platform: String,

        /// Redirect URI registered with the OAuth client
        #[arg(long)]
        redirect_uri: String,
    },

    /// Connect an account with an OAuth authorization code
    Connect {
        platform: String,

        /// Authorization code returned to the redirect URI
        #[arg(long)]
        code: String,

        #[arg(long)]
        redirect_uri: String,

        /// PKCE verifier printed by `authorize`
        #[arg(long)]
        code_verifier: Option<String>,
    },

    /// Record an account by username; it stays pending until connected
    Manual {
        platform: String,

        username: String,

        #[arg(long)]
        profile_url: Option<String>,
    },

    /// List the user's active accounts
    List,

    /// Refresh an account's access token if it has expired
    Refresh { account_id: String },

    /// Re-read an account's profile from the platform
    Sync { account_id: String },

    /// Show account metrics
    Analytics {
        account_id: String,

        /// day, week, month or year
        #[arg(short, long, default_value = "week")]
        timeframe: String,
    },

    /// Show recent posts of an account
    History {
        account_id: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Disconnect an account; post history is kept
    Disconnect { account_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    liblinkcast::logging::from_env_with_level(cli.verbose, "warn").init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<LinkcastError>()
        .map(LinkcastError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> Result<()> {
    let json = cli.format == "json";

    match cli.command {
        // Static table; no configuration or database needed
        Commands::Platforms => print_platforms(json),
        command => {
            let config = Config::load_or_default()?;
            let service = LinkcastService::from_config(config).await?;
            run_command(&service, &cli.user, json, command).await
        }
    }
}

async fn run_command(
    service: &LinkcastService,
    user: &str,
    json: bool,
    command: Commands,
) -> Result<()> {
    let accounts = service.accounts();

    match command {
        Commands::Platforms => print_platforms(json)?,
        Commands::Authorize {
            platform,
            redirect_uri,
        } => {
            let platform: Platform = platform.parse().map_err(LinkcastError::from)?;
            let request = accounts.authorization_request(platform, &redirect_uri)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "platform": request.platform,
                        "url": request.url,
                        "state": request.state,
                        "code_verifier": request.code_verifier,
                    }))?
                );
            } else {
                println!("Open this URL to authorize {}:", platform.config().name);
                println!("  {}", request.url);
                println!("State: {}", request.state);
                if let Some(verifier) = &request.code_verifier {
                    println!("Code verifier (pass to connect): {}", verifier);
                }
            }
        }
        Commands::Connect {
            platform,
            code,
            redirect_uri,
            code_verifier,
        } => {
            let account = match code_verifier {
                Some(verifier) => {
                    accounts
                        .connect_account_with_verifier(
                            user,
                            &platform,
                            &code,
                            &redirect_uri,
                            &verifier,
                        )
                        .await?
                }
                None => {
                    accounts
                        .connect_account(user, &platform, &code, &redirect_uri)
                        .await?
                }
            };
            print_account(&account, json, "Connected")?;
        }
        Commands::Manual {
            platform,
            username,
            profile_url,
        } => {
            let account = accounts
                .connect_manual(user, &platform, &username, profile_url)
                .await?;
            print_account(&account, json, "Recorded")?;
        }
        Commands::List => {
            let list = accounts.get_user_accounts(user).await?;
            print_accounts(&list, json)?;
        }
        Commands::Refresh { account_id } => {
            let account = owned_account(service, user, &account_id).await?;
            let account = accounts.refresh_account(&account.id).await?;
            print_account(&account, json, "Refreshed")?;
        }
        Commands::Sync { account_id } => {
            let account = owned_account(service, user, &account_id).await?;
            let account = accounts.sync_account(&account.id).await?;
            print_account(&account, json, "Synced")?;
        }
        Commands::Analytics {
            account_id,
            timeframe,
        } => {
            let timeframe: Timeframe = timeframe.parse().map_err(LinkcastError::InvalidInput)?;
            let account = owned_account(service, user, &account_id).await?;
            let metrics = service
                .analytics()
                .get_account_analytics(&account.id, timeframe)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!(
                    "{} @{} ({})",
                    account.platform, account.username, timeframe
                );
                println!("  followers:   {}", metrics.followers);
                println!("  following:   {}", metrics.following);
                println!("  posts:       {}", metrics.posts);
                println!("  impressions: {}", metrics.impressions);
                println!("  reach:       {}", metrics.reach);
                println!("  likes:       {}", metrics.likes);
                println!("  comments:    {}", metrics.comments);
                println!("  shares:      {}", metrics.shares);
                println!("  views:       {}", metrics.views);
                println!("  engagement:  {:.2}%", metrics.engagement_rate);
            }
        }
        Commands::History { account_id, limit } => {
            let account = owned_account(service, user, &account_id).await?;
            let records = service.analytics().post_history(&account.id, limit).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No posts for @{}", account.username);
            } else {
                for record in records {
                    let when = chrono::DateTime::from_timestamp(record.created_at, 0)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!(
                        "{}  {:<9}  {}  {}",
                        when,
                        record.status.as_str(),
                        record.id,
                        preview(&record.text)
                    );
                    if let Some(error) = record.error_message {
                        println!("    error: {}", error);
                    }
                }
            }
        }
        Commands::Disconnect { account_id } => {
            let disconnected = accounts.disconnect_account(user, &account_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "account_id": account_id, "disconnected": disconnected })
                );
            } else if disconnected {
                println!("Disconnected account {}", account_id);
            } else {
                println!("Account {} was already disconnected", account_id);
            }
        }
    }

    Ok(())
}

/// Load an active account and check that `user` owns it
async fn owned_account(
    service: &LinkcastService,
    user: &str,
    account_id: &str,
) -> liblinkcast::Result<PlatformAccount> {
    let account = service.accounts().get_account(account_id).await?;
    if account.user_id != user {
        return Err(liblinkcast::error::AccountError::Unauthorized {
            account_id: account_id.to_string(),
            user_id: user.to_string(),
        }
        .into());
    }
    Ok(account)
}

#[derive(Serialize)]
struct PlatformRow<'a> {
    key: &'a str,
    name: &'a str,
    can_post: bool,
    can_schedule: bool,
    can_analyze: bool,
    characters_per_post: usize,
    images_per_post: usize,
    posts_per_hour: u32,
    posts_per_day: u32,
}

impl<'a> From<&'a PlatformConfig> for PlatformRow<'a> {
    fn from(config: &'a PlatformConfig) -> Self {
        Self {
            key: config.platform.as_str(),
            name: config.name,
            can_post: config.capabilities.can_post,
            can_schedule: config.capabilities.can_schedule,
            can_analyze: config.capabilities.can_analyze,
            characters_per_post: config.limits.characters_per_post,
            images_per_post: config.limits.images_per_post,
            posts_per_hour: config.limits.posts_per_hour,
            posts_per_day: config.limits.posts_per_day,
        }
    }
}

fn print_platforms(json: bool) -> Result<()> {
    let rows: Vec<PlatformRow> = liblinkcast::platforms::supported_platforms()
        .map(PlatformRow::from)
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{:<10} {:>6} {:>7} {:>9} {:>8}  {}",
        "PLATFORM", "CHARS", "IMAGES", "PER HOUR", "PER DAY", "SCHEDULING"
    );
    for row in rows {
        println!(
            "{:<10} {:>6} {:>7} {:>9} {:>8}  {}",
            row.key,
            row.characters_per_post,
            row.images_per_post,
            row.posts_per_hour,
            row.posts_per_day,
            if row.can_schedule { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn print_account(account: &PlatformAccount, json: bool, verb: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&account.summary())?);
    } else {
        println!(
            "{} {} account @{} ({})",
            verb, account.platform, account.username, account.id
        );
        println!("  status: {}", account.connection_status.as_str());
    }
    Ok(())
}

fn print_accounts(accounts: &[PlatformAccount], json: bool) -> Result<()> {
    if json {
        let summaries: Vec<AccountSummary> = accounts.iter().map(|a| a.summary()).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("No linked accounts");
        return Ok(());
    }

    for account in accounts {
        println!(
            "{}  {:<10} @{:<20} {:<9} {} followers",
            account.id,
            account.platform.as_str(),
            account.username,
            account.connection_status.as_str(),
            account.follower_count
        );
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(57).collect::<String>())
    } else {
        line.to_string()
    }
}
