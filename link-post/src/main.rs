//! link-post - Post content to linked social platform accounts

use clap::Parser;
use liblinkcast::scheduling::parse_schedule;
use liblinkcast::{BulkOutcome, Config, LinkcastError, LinkcastService, PostContent, PostOutcome};
use std::io::{IsTerminal, Read};

#[derive(Parser, Debug)]
#[command(name = "link-post")]
#[command(version)]
#[command(about = "Post content to linked social platform accounts")]
#[command(long_about = "\
link-post - Post content to linked social platform accounts

DESCRIPTION:
    Validates content against each target platform's limits, then publishes
    it to every given account one after another. With --schedule the post is
    queued instead and dispatched later by link-send.

USAGE EXAMPLES:
    link-post \"Open gym tonight at 7\" --account <ID>
    echo \"Tryouts Saturday\" | link-post -a <ID1> -a <ID2>
    link-post \"Highlights\" -a <ID> --image https://cdn.example/1.jpg
    link-post \"Game day\" -a <ID> --schedule \"in 2 hours\"
    link-post \"Recap\" -a <ID> --format json | jq '.results[].success'

OUTPUT:
    One line per account on stdout: platform:external_id for published
    posts, platform:scheduled:entry_id for queued ones. Failures go to stderr.

EXIT CODES:
    0 - Success on at least one account
    1 - Posting failed
    2 - Authentication error (expired token, account of another user)
    3 - Invalid input (empty content, over limits, bad schedule)
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target account id; repeat for several accounts
    #[arg(short, long = "account", value_name = "ID", required = true)]
    accounts: Vec<String>,

    /// Image URL to attach; repeatable
    #[arg(short, long = "image", value_name = "URL")]
    images: Vec<String>,

    /// Video URL to attach
    #[arg(long, value_name = "URL")]
    video: Option<String>,

    /// Queue instead of posting now ("in 2 hours", "30m", "tomorrow 9am", RFC 3339)
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    liblinkcast::logging::from_env_with_level(cli.verbose, "warn").init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<LinkcastError>()
        .map(LinkcastError::exit_code)
        .unwrap_or(1)
}

/// Post and report; returns the process exit code
async fn run(cli: Cli) -> anyhow::Result<i32> {
    let text = match cli.content {
        Some(text) => text,
        None => read_stdin()?,
    };

    let mut content = PostContent::text(text).with_images(cli.images);
    if let Some(video) = cli.video {
        content = content.with_video(video);
    }
    if let Some(when) = &cli.schedule {
        content = content.scheduled_at(parse_schedule(when)?.timestamp());
    }

    let config = Config::load_or_default()?;
    let service = LinkcastService::from_config(config).await?;

    let outcome = match cli.accounts.as_slice() {
        [account_id] => {
            let result = service.posting().post_to_account(account_id, &content).await;
            BulkOutcome::from_results(vec![result])
        }
        account_ids => service
            .posting()
            .post_to_multiple_accounts(account_ids, &content)
            .await,
    };

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for result in &outcome.results {
            print_outcome(result);
        }
    }

    Ok(bulk_exit_code(&outcome))
}

fn read_stdin() -> anyhow::Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Err(LinkcastError::InvalidInput(
            "No content provided. Pass it as an argument or pipe it on stdin".to_string(),
        )
        .into());
    }

    let mut buffer = String::new();
    stdin.read_to_string(&mut buffer)?;
    Ok(buffer.trim_end_matches(['\n', '\r']).to_string())
}

fn print_outcome(outcome: &PostOutcome) {
    let platform = outcome
        .platform
        .map(|p| p.as_str())
        .unwrap_or("unknown");

    match (&outcome.error, &outcome.scheduled_id, &outcome.external_post_id) {
        (Some(error), _, _) => eprintln!("Error: {} ({}): {}", outcome.account_id, platform, error),
        (None, Some(entry_id), _) => println!("{}:scheduled:{}", platform, entry_id),
        (None, None, Some(external_id)) => println!("{}:{}", platform, external_id),
        (None, None, None) => println!("{}:ok", platform),
    }
}

/// 0 when any account succeeded, otherwise the shared failure code (or 1)
fn bulk_exit_code(outcome: &BulkOutcome) -> i32 {
    if outcome.success {
        return 0;
    }

    let mut codes = outcome.results.iter().map(|r| r.exit_code);
    match codes.next() {
        Some(first) if codes.all(|c| c == first) && first != 0 => first,
        _ => 1,
    }
}
