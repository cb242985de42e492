mod feed;

use std::time::Duration;

use affdb_feed::{FeedFetcher, FeedIndex, FeedStore, FetchSettings};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "affdb-cli")]
#[command(about = "Look up affiliate product data from a cached AWIN feed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Look up a product by EAN or GTIN, refreshing the feed if stale
    Lookup {
        /// EAN or GTIN of the product
        identifier: String,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the feed now, regardless of the cache's age
    Refresh,
    /// Show the cached feed's location, age and freshness
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = affdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?config, "configuration loaded");

    let source = config.feed_source();
    let store = FeedStore::for_source(&source, Duration::from_secs(config.feed_max_age_secs));
    let settings = FetchSettings {
        timeout_secs: config.http_timeout_secs,
        user_agent: config.user_agent.clone(),
    };
    let fetcher = FeedFetcher::new(&source, &settings)?;
    let index = FeedIndex::new(source, store, fetcher);

    match cli.command {
        Commands::Lookup { identifier, json } => feed::run_lookup(&index, &identifier, json).await,
        Commands::Refresh => feed::run_refresh(&index).await,
        Commands::Status => feed::run_status(&index).await,
    }
}
