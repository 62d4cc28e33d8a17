use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::error::Result;

const USER_AGENT_STRING: &str = "wordwatch/1.0";

/// Fetches raw feed documents over HTTP, backed by a time-based on-disk
/// cache so repeated runs within the TTL never touch the network.
pub struct FeedFetcher {
    client: Client,
    cache_dir: PathBuf,
    cache_ttl: Duration,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            cache_dir: PathBuf::from(&config.cache_dir),
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
        })
    }

    /// Fetch one feed. An `Err` means "feed unavailable this cycle"; the
    /// caller logs it and moves on to the next feed.
    pub async fn fetch(&self, url: &str, use_cache: bool) -> Result<String> {
        let cache_file = self.cache_path(url);

        if use_cache {
            if let Some(cached) = self.read_cache(&cache_file) {
                tracing::debug!("Cache hit for {}", url);
                return Ok(cached);
            }
        }

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("failed to fetch feed: HTTP {}", response.status()).into());
        }
        let body = response.text().await?;

        // Cache writes are best-effort; a full disk must not fail the fetch.
        if use_cache {
            if let Err(e) = std::fs::write(&cache_file, &body) {
                tracing::warn!("Failed to write cache file {:?}: {}", cache_file, e);
            }
        }

        Ok(body)
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.cache_dir.join(format!("{}.xml", hex::encode(digest)))
    }

    fn read_cache(&self, path: &Path) -> Option<String> {
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        let age = modified.elapsed().ok()?;
        if age < self.cache_ttl {
            std::fs::read_to_string(path).ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(cache_dir: &Path, ttl: u64) -> Config {
        Config {
            cache_dir: cache_dir.to_string_lossy().to_string(),
            cache_ttl_secs: ttl,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn fresh_cache_entry_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FeedFetcher::new(&test_config(dir.path(), 3600)).unwrap();

        // Nothing listens on port 1, so any network attempt fails immediately.
        let url = "http://127.0.0.1:1/feed.xml";
        let body = "<rss><channel><item><title>cached</title></item></channel></rss>";
        std::fs::write(fetcher.cache_path(url), body).unwrap();

        let fetched = fetcher.fetch(url, true).await.unwrap();
        assert_eq!(fetched, body);
    }

    #[tokio::test]
    async fn expired_cache_entry_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FeedFetcher::new(&test_config(dir.path(), 0)).unwrap();

        let url = "http://127.0.0.1:1/feed.xml";
        std::fs::write(fetcher.cache_path(url), "stale").unwrap();

        // TTL of zero makes every entry stale, so this must go to the
        // network and fail against the closed port.
        assert!(fetcher.fetch(url, true).await.is_err());
    }

    #[test]
    fn cache_key_is_stable_per_url() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FeedFetcher::new(&test_config(dir.path(), 3600)).unwrap();

        let a = fetcher.cache_path("https://example.com/a");
        assert_eq!(a, fetcher.cache_path("https://example.com/a"));
        assert_ne!(a, fetcher.cache_path("https://example.com/b"));
        assert_eq!(a.extension().unwrap(), "xml");
    }
}
