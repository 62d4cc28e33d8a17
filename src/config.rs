use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{FeedList, FeedSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Count titles only, or the full description/content of every item.
    #[serde(default = "default_titles_only")]
    pub titles_only: bool,

    #[serde(default = "default_max_feeds_per_run")]
    pub max_feeds_per_run: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Pause between feeds within one run, to avoid hammering upstreams.
    #[serde(default = "default_feed_delay_ms")]
    pub feed_delay_ms: u64,

    /// Some feeds serve self-signed or expired certificates; the fetcher
    /// tolerates them when this is on. Turn off to require verification.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    #[serde(default = "default_cache_retention_days")]
    pub cache_retention_days: i64,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,

    #[serde(default = "default_analysis_retention_days")]
    pub analysis_retention_days: i64,
}

fn app_dir(sub: &str) -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wordwatch")
        .join(sub)
        .to_string_lossy()
        .to_string()
}

fn default_data_dir() -> String {
    app_dir("data")
}

fn default_cache_dir() -> String {
    app_dir("cache")
}

fn default_logs_dir() -> String {
    app_dir("logs")
}

fn default_titles_only() -> bool {
    true
}

fn default_max_feeds_per_run() -> usize {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_feed_delay_ms() -> u64 {
    500
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_retention_days() -> i64 {
    90
}

fn default_cache_retention_days() -> i64 {
    7
}

fn default_log_retention_days() -> i64 {
    30
}

fn default_analysis_retention_days() -> i64 {
    90
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_dir: default_cache_dir(),
            logs_dir: default_logs_dir(),
            titles_only: default_titles_only(),
            max_feeds_per_run: default_max_feeds_per_run(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            feed_delay_ms: default_feed_delay_ms(),
            accept_invalid_certs: default_accept_invalid_certs(),
            retention_days: default_retention_days(),
            cache_retention_days: default_cache_retention_days(),
            log_retention_days: default_log_retention_days(),
            analysis_retention_days: default_analysis_retention_days(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        for dir in [&config.data_dir, &config.cache_dir, &config.logs_dir] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wordwatch")
            .join("config.toml")
    }

    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("analytics.db")
    }

    pub fn feeds_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("feeds.json")
    }

    pub fn stopwords_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("stopwords.json")
    }

    pub fn state_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("collection_state.json")
    }

    pub fn alerts_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("alerts.json")
    }

    pub fn coefficients_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("trend_coefficients.json")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("analysis")
    }
}

/// Stopwords shipped by default; the on-disk list is seeded with these on
/// first run and is editable externally.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "and", "to", "of", "a", "in", "that", "is", "it", "with", "for", "on", "as", "was",
    "by", "at", "an", "be", "this", "have", "from", "or", "which", "one", "you", "we", "are",
    "all", "your", "their", "what", "our", "us", "has", "had", "but", "not", "they", "i", "he",
    "she", "his", "her", "him", "them", "so", "if", "about", "who", "get", "like", "just", "my",
    "me", "more", "out", "up", "some", "will", "how", "when", "where", "why", "can", "should",
    "would", "could", "continue", "reading", "after", "says", "other", "its", "were", "said",
    "over", "been", "went", "say", "than", "apos", "week", "year", "two", "first", "into",
    "news", "new", "years", "down", "discuss", "next", "while", "time", "being", "under", "no",
    "between", "latest", "now", "many", "last", "off", "use", "live", "make", "there", "here",
];

/// Read the configured feed list. A missing file is a legitimate state
/// (no feeds configured yet) and yields an empty list.
pub fn load_feeds(path: &Path) -> Result<Vec<FeedSource>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let list: FeedList = serde_json::from_str(&content)?;

    let mut feeds = Vec::new();
    for feed in list.feeds {
        if url::Url::parse(&feed.url).is_err() {
            tracing::warn!("Skipping feed {} with invalid URL {}", feed.name, feed.url);
            continue;
        }
        feeds.push(feed);
    }
    Ok(feeds)
}

/// Read the stopword list, seeding the file with the defaults when absent.
pub fn load_stopwords(path: &Path) -> Result<HashSet<String>> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let words: Vec<String> = serde_json::from_str(&content)?;
        return Ok(words.into_iter().collect());
    }

    let defaults: Vec<String> = DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&defaults)?)?;
    Ok(defaults.into_iter().collect())
}
