use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info};

use edufeed::aggregator::Aggregator;
use edufeed::db::Database;
use edufeed::dispatcher::{Dispatcher, FIRST_RUN_DELAY};
use edufeed::environment::{Config, TelegramSettings};
use edufeed::filter::{default_recency_window, is_recent, matches_keywords};
use edufeed::logging;
use edufeed::rss::FeedFetcher;
use edufeed::telegram::TelegramClient;
use edufeed::TARGET_PIPELINE;

#[derive(Parser)]
#[clap(name = "edufeed", about = "Collect educational articles from feeds and post them to a channel")]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one collection and delivery pass, then exit
    Run,

    /// Run delivery passes on a schedule until interrupted
    Daemon {
        /// Hours between runs (overrides POST_INTERVAL_HOURS)
        #[clap(short, long)]
        interval_hours: Option<u64>,
    },

    /// Show how many items have been delivered per category
    Stats {
        /// Number of recent deliveries to list
        #[clap(short, long, default_value = "10")]
        recent: u32,
    },

    /// Fetch a single feed and show what the pipeline would see in it
    CheckFeed {
        /// Feed URL
        #[clap(required = true)]
        url: String,

        /// Keywords to test entries against
        #[clap(short, long, num_args = 1..)]
        keywords: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::configure_logging();

    let args = Cli::parse();
    let config = Config::from_env()?;

    match args.command {
        Commands::Run => {
            let dispatcher = build_dispatcher(&config).await?;
            let delivered = dispatcher.collect_and_send().await;
            println!("Delivered {} items", delivered.to_string().bright_green());
        }
        Commands::Daemon { interval_hours } => {
            let interval = match interval_hours {
                Some(0) => return Err(anyhow!("--interval-hours must be at least 1")),
                Some(hours) => Duration::from_secs(hours * 3600),
                None => config.post_interval,
            };
            let dispatcher = build_dispatcher(&config).await?;

            info!(target: TARGET_PIPELINE, "Starting with {} categories", config.categories.len());
            tokio::select! {
                _ = dispatcher.run_forever(interval, FIRST_RUN_DELAY) => {}
                result = signal::ctrl_c() => {
                    if let Err(err) = result {
                        error!(target: TARGET_PIPELINE, "Failed to listen for ctrl-c: {}", err);
                    }
                    info!(target: TARGET_PIPELINE, "Shutting down");
                }
            }
            dispatcher.shutdown().await;
        }
        Commands::Stats { recent } => {
            let db = Database::new(&config.database_path).await?;
            print_stats(&db, recent).await?;
            db.close().await;
        }
        Commands::CheckFeed { url, keywords } => {
            check_feed(&url, &keywords).await?;
        }
    }

    Ok(())
}

async fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let telegram = TelegramClient::new(&TelegramSettings::from_env()?)?;
    let db = Database::new(&config.database_path).await?;
    let aggregator = Aggregator::new(db.clone())?.with_full_text(config.fetch_full_text);

    Ok(Dispatcher::new(
        db,
        aggregator,
        telegram,
        config.categories.clone(),
        config.post_delay,
    ))
}

async fn print_stats(db: &Database, recent: u32) -> Result<()> {
    let counts = db.category_counts().await?;
    let total = db.total_posted().await?;

    println!("{}", "Delivered content".bright_blue());
    println!("{}", "─".repeat(40).dimmed());
    if counts.is_empty() {
        println!("{}", "Nothing delivered yet".dimmed());
    }
    for (category, count) in &counts {
        println!("{:<28} {}", category.bright_magenta(), count);
    }
    println!("{}", "─".repeat(40).dimmed());
    println!("{:<28} {}", "Total".bright_blue(), total.to_string().bright_green());

    if recent > 0 && total > 0 {
        println!("\n{}", "Most recent".bright_blue());
        for record in db.recent_posts(recent).await? {
            println!(
                "{} [{}] {}\n    {}",
                record.posted_at.as_deref().unwrap_or("-").dimmed(),
                record.category.bright_magenta(),
                record.title,
                record.url.dimmed()
            );
        }
    }

    Ok(())
}

async fn check_feed(url: &str, keywords: &[String]) -> Result<()> {
    let fetcher = FeedFetcher::new()?;
    let entries = fetcher
        .fetch(url)
        .await
        .ok_or_else(|| anyhow!("Could not load a feed from {} (see log for details)", url))?;

    println!("\n{}", "═".repeat(100).bright_blue());
    println!("{}  {}", "FEED CHECK".bright_blue(), url.bright_yellow());
    println!("{}", "═".repeat(100).bright_blue());
    println!("{}: {}", "Entries Found".bright_blue(), entries.len());

    let now = Utc::now();
    let window = default_recency_window();
    for entry in &entries {
        let recency = if is_recent(entry, window, now) {
            "recent".bright_green()
        } else {
            "stale".bright_red()
        };
        let date = entry
            .timestamp()
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "undated".to_string());

        print!("{} {} {}", recency, date.dimmed(), entry.title_or_placeholder());
        if !keywords.is_empty() {
            if matches_keywords(&entry.match_text(), keywords) {
                print!(" {}", "[match]".bright_green());
            } else {
                print!(" {}", "[no match]".dimmed());
            }
        }
        println!("\n    {}", entry.link.dimmed());
    }

    Ok(())
}
