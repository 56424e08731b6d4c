use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use subreddit_alert::config::Config;
use subreddit_alert::engine::filter::PostFilter;
use subreddit_alert::engine::scanner::Scanner;
use subreddit_alert::feed::{auth::RedditAuth, reddit::RedditFeed};
use subreddit_alert::notify::{pushbullet::PushbulletNotifier, LogNotifier, Notifier};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Push a notification when a matching post shows up on a subreddit")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Run a single scan and exit
    #[arg(long)]
    once: bool,

    /// Print matches instead of sending them to Pushbullet
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("subreddit_alert=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let filter = PostFilter::new(&config.filter)?;

    // Load saved keys from .env (real env vars take precedence)
    Config::load_env_file();

    println!();
    println!("  subreddit-alert v{}", env!("CARGO_PKG_VERSION"));
    println!("  watching r/{} for {:?}", config.subreddit, filter.terms());
    if cli.dry_run {
        println!("  ** DRY RUN ** (notifications are printed, not pushed)");
    }
    println!();

    let creds = Config::credentials(!cli.dry_run)?;
    let timeout = config.poll.request_timeout();

    let auth = RedditAuth::new(creds.reddit_client_id, creds.reddit_client_secret, &config.reddit);
    let feed = RedditFeed::new(auth, &config.reddit, timeout)?;
    let notifier: Box<dyn Notifier> = match creds.pushbullet_token {
        Some(token) if !cli.dry_run => {
            Box::new(PushbulletNotifier::new(token, &config.pushbullet, timeout)?)
        }
        _ => Box::new(LogNotifier),
    };

    let mut scanner = Scanner::new(config.subreddit.clone(), filter, Box::new(feed), notifier);
    let interval = config.poll.interval();

    loop {
        match scanner.scan().await {
            Ok(posts) => {
                tracing::debug!(
                    source = scanner.source(),
                    notified = posts.len(),
                    watermark = %scanner.watermark(),
                    "scan complete"
                );
            }
            Err(e) => {
                tracing::error!(source = scanner.source(), "scan failed: {:#}", e);
            }
        }

        if cli.once {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}
