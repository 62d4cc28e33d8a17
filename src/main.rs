use clap::{Parser, Subcommand};
use serde::Serialize;

mod analysis;
mod collector;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod retention;
mod scheduler;
mod text;

use analysis::Analyzer;
use collector::Collector;
use config::Config;
use db::Repository;
use error::Result;
use retention::Retention;

#[derive(Parser)]
#[command(name = "wordwatch", version, about = "RSS word frequency trend analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the next batch of feeds and store their word counts
    Collect {
        /// Always hit the network, ignoring cached feed bodies
        #[arg(long)]
        no_cache: bool,

        /// Also store an aggregate collection across all fetched feeds
        #[arg(long)]
        combined: bool,
    },
    /// Run the daily trend analysis, alerting, and coefficient update
    Analyze,
    /// Apply retention policies to the database, cache, logs, and snapshots
    Cleanup,
    /// Query the analytics store and print JSON to stdout
    #[command(subcommand)]
    Query(Query),
}

#[derive(Subcommand)]
enum Query {
    /// Most frequent words over a recent window
    Trending {
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Collection counts and word volume per feed
    FeedActivity {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Article and word volume per time bucket
    DailyStats {
        /// Window size; 48 hours or less buckets by hour, otherwise by day
        #[arg(long, default_value_t = 168)]
        hours: i64,
        #[arg(long)]
        feed: Option<String>,
    },
    /// Daily mention counts for one word
    WordTrend {
        word: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long)]
        feed: Option<String>,
    },
    /// Per-feed breakdown and recent articles for one word
    WordDetails {
        word: String,
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long, default_value_t = 10)]
        articles: i64,
    },
    /// Top words within a single feed
    TopWords {
        feed: String,
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Words that appear in the same collections as the given word
    Cooccurrence {
        word: String,
        #[arg(long, default_value_t = 7)]
        days: i64,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Search stored articles by keyword
    Search {
        keyword: String,
        #[arg(long)]
        feed: Option<String>,
    },
    /// Most recent collections
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Store-wide totals and date range
    Stats,
}

#[derive(Serialize)]
struct WordDetails {
    word: String,
    feeds: Vec<models::FeedMentions>,
    articles: Vec<models::StoredArticle>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let db_path = config.db_path();
    let repository = Repository::new(&db_path.to_string_lossy()).await?;

    match cli.command {
        Command::Collect { no_cache, combined } => {
            let collector = Collector::new(config, repository)?;
            collector.run(!no_cache, combined).await?;
        }
        Command::Analyze => {
            Analyzer::new(config, repository).run().await?;
        }
        Command::Cleanup => {
            Retention::new(config, repository).run().await?;
        }
        Command::Query(query) => match query {
            Query::Trending { days, limit } => {
                print_json(&repository.trending_words(days, limit).await?)?;
            }
            Query::FeedActivity { days } => {
                print_json(&repository.feed_activity(days).await?)?;
            }
            Query::DailyStats { hours, feed } => {
                print_json(&repository.bucket_stats(hours, feed).await?)?;
            }
            Query::WordTrend { word, days, feed } => {
                print_json(&repository.word_trend_series(&word, days, feed).await?)?;
            }
            Query::WordDetails { word, days, articles } => {
                let feeds = repository.word_feed_breakdown(&word, days).await?;
                let articles = repository.articles_for_word(&word, days, articles).await?;
                print_json(&WordDetails { word, feeds, articles })?;
            }
            Query::TopWords { feed, days, limit } => {
                print_json(&repository.feed_top_words(&feed, days, limit).await?)?;
            }
            Query::Cooccurrence { word, days, limit } => {
                print_json(&repository.cooccurring_words(&word, days, limit).await?)?;
            }
            Query::Search { keyword, feed } => {
                print_json(&repository.search_articles(&keyword, feed).await?)?;
            }
            Query::Recent { limit } => {
                print_json(&repository.recent_collections(limit).await?)?;
            }
            Query::Stats => {
                print_json(&repository.store_stats().await?)?;
            }
        },
    }

    Ok(())
}
