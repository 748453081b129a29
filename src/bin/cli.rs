//! hnwatch CLI
//!
//! `serve` exposes `GET /poll` for an external scheduler (cron, uptime
//! pinger, ...). `poll` runs one cycle in-process for crontab use.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hnwatch::{
    config::{load_config, load_validated},
    error::Result,
    logging,
    matcher::TitleMatcher,
    pipeline::Poller,
    server::{self, AppState},
    storage::open_store,
};
use tracing::{error, info};

/// hnwatch - mail new Hacker News stories matching your keywords
#[derive(Parser, Debug)]
#[command(name = "hnwatch", version, about = "Hacker News keyword watcher")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "hnwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP poll trigger
    Serve {
        /// Listen address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Also poll on this period, in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single poll cycle
    Poll,

    /// Show whether a title would match
    Check {
        /// Story title to classify
        title: String,
    },

    /// Look up a discussion URL in the store
    Seen {
        /// Discussion URL, e.g. https://news.ycombinator.com/item?id=1
        item_url: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Command::Serve { bind, interval } => {
            let config = load_validated(&cli.config)?;
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let interval = interval
                .or(config.server.poll_interval_secs)
                .filter(|secs| *secs > 0);

            let (poller, worker) = Poller::from_config(&config).await?;
            let poller = Arc::new(poller);

            let scheduler = interval.map(|secs| {
                server::spawn_scheduler(Arc::clone(&poller), Duration::from_secs(secs))
            });

            server::run_server(AppState { poller }, &bind).await?;

            if let Some(scheduler) = scheduler {
                scheduler.abort();
                let _ = scheduler.await;
            }
            // The router and scheduler held the last poller handles.
            if let Err(e) = worker.await {
                error!("Notification worker panicked: {}", e);
            }
        }

        Command::Poll => {
            let config = load_validated(&cli.config)?;
            let (poller, worker) = Poller::from_config(&config).await?;

            let outcome = poller.poll().await;
            drop(poller);
            // Let queued notifications go out before exiting.
            if let Err(e) = worker.await {
                error!("Notification worker panicked: {}", e);
            }

            match outcome {
                Ok(report) => info!(
                    "Poll OK: {} entries, {} matched, {} new",
                    report.entries, report.matched, report.claimed
                ),
                Err(e) => {
                    error!("{}: {}", e.description(), e);
                    std::process::exit(1);
                }
            }
        }

        Command::Check { title } => {
            let config = load_config(&cli.config)?;
            let matcher = TitleMatcher::new(&config.matcher.keywords);
            match matcher.matching_keyword(&title) {
                Some(keyword) => println!("match ({keyword})"),
                None => println!("no match"),
            }
        }

        Command::Seen { item_url } => {
            let config = load_config(&cli.config)?;
            let store = open_store(&config.storage).await?;
            match store.load(&item_url).await? {
                Some(link) => println!("{}", serde_json::to_string_pretty(&link)?),
                None => println!("not seen"),
            }
        }

        Command::Validate => {
            info!("Validating configuration...");
            let config = load_validated(&cli.config)?;
            info!(
                "✓ Config OK ({} keywords, mail to {})",
                config.matcher.keywords.len(),
                config.mail.recipient
            );
        }
    }

    Ok(())
}
