//! link-send - Background daemon for scheduled posting
//!
//! Polls the scheduled post queue and dispatches every entry whose fire time
//! has passed. Also lists and cancels queued entries.

use anyhow::Result;
use clap::{Parser, Subcommand};
use liblinkcast::rate_limiter::RateLimiter;
use liblinkcast::{Config, LinkcastError, LinkcastService};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "link-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting")]
#[command(long_about = "\
link-send - Background daemon for scheduled posting

DESCRIPTION:
    link-send is a long-running daemon that watches the Linkcast queue and
    posts scheduled content once its time has come. Entries are dispatched
    one at a time with the configured bulk delay between them; each is closed
    as dispatched or failed and never retried.

USAGE:
    # Run in foreground (logs to stderr)
    link-send

    # Run with custom poll interval
    link-send --poll-interval 30

    # Dispatch whatever is due and exit (cron-friendly)
    link-send --once

    # Inspect or edit the queue
    link-send queue --format json
    link-send cancel <ENTRY_ID>

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes current post)

CONFIGURATION:
    Configuration file: ~/.config/linkcast/config.toml

    [scheduling]
    poll_interval = 60  # seconds between polls

    [dispatch]
    bulk_delay_ms = 2000

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Process due posts once and exit
    #[arg(long)]
    once: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued entries, soonest first
    Queue {
        /// Only entries of this account
        #[arg(short, long)]
        account: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        #[arg(value_parser = ["text", "json"])]
        format: String,
    },

    /// Cancel a queued entry
    Cancel { entry_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    liblinkcast::logging::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(
            e.downcast_ref::<LinkcastError>()
                .map(LinkcastError::exit_code)
                .unwrap_or(1),
        );
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_or_default()?;
    let poll_interval = cli.poll_interval.unwrap_or(config.scheduling.poll_interval);
    let service = LinkcastService::from_config(config).await?;

    match cli.command {
        Some(Commands::Queue { account, format }) => {
            list_queue(&service, account, &format).await
        }
        Some(Commands::Cancel { entry_id }) => {
            service.scheduler().cancel(&entry_id).await?;
            println!("Cancelled scheduled post {}", entry_id);
            Ok(())
        }
        None => {
            info!("link-send daemon starting");
            info!("Poll interval: {}s", poll_interval);

            if cli.once {
                process_due_posts(&service).await?;
                info!("link-send: processed due posts once, exiting");
                return Ok(());
            }

            if poll_interval == 0 {
                return Err(LinkcastError::InvalidInput(
                    "Poll interval must be at least 1 second".to_string(),
                )
                .into());
            }

            let shutdown = Arc::new(AtomicBool::new(false));
            setup_signal_handlers(shutdown.clone())?;

            run_daemon_loop(&service, poll_interval, shutdown).await;
            info!("link-send daemon stopped");
            Ok(())
        }
    }
}

/// Flip `shutdown` on SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| LinkcastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}, stopping gracefully...", signal);
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

async fn run_daemon_loop(
    service: &LinkcastService,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_due_posts(service).await {
            error!("Error processing scheduled posts: {}", e);
        }

        // Sleep in one-second steps so a signal is noticed quickly
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Dispatch everything due now, then prune stale rate windows
async fn process_due_posts(service: &LinkcastService) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let outcomes = service.scheduler().process_due(now).await?;

    for outcome in &outcomes {
        let entry = outcome.scheduled_id.as_deref().unwrap_or("-");
        match &outcome.error {
            None => info!(
                "Scheduled post {} published to account {}",
                entry, outcome.account_id
            ),
            Some(error) => warn!(
                "Scheduled post {} failed for account {}: {}",
                entry, outcome.account_id, error
            ),
        }
    }

    let removed = service
        .posting()
        .rate_limiter()
        .cleanup_old_windows(RateLimiter::retention_cutoff(now))
        .await?;
    if removed > 0 {
        info!("Removed {} stale rate-limit windows", removed);
    }

    Ok(())
}

async fn list_queue(
    service: &LinkcastService,
    account: Option<String>,
    format: &str,
) -> Result<()> {
    let entries = service.scheduler().pending(account.as_deref()).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No scheduled posts");
        return Ok(());
    }

    for entry in entries {
        let when = chrono::DateTime::from_timestamp(entry.fire_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| entry.fire_at.to_string());
        println!("{}  {}  {}  {}", entry.id, when, entry.account_id, entry.content.text);
    }
    Ok(())
}
