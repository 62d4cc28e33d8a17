use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::config::{self, Config};
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{extract_articles, extract_text, FeedFetcher};
use crate::models::{ExtractedArticle, FeedSource};
use crate::scheduler;
use crate::text;

/// Feed name recorded for the aggregate pass across all fetched feeds.
const COMBINED_FEED_NAME: &str = "Combined Feeds";

/// Per-feed outcome of one run, logged at the end for operators.
struct ProcessingEntry {
    feed: String,
    articles: usize,
    words: i64,
    elapsed: Duration,
    ok: bool,
}

pub struct Collector {
    config: Config,
    repository: Repository,
    fetcher: FeedFetcher,
}

impl Collector {
    pub fn new(config: Config, repository: Repository) -> Result<Self> {
        let fetcher = FeedFetcher::new(&config)?;
        Ok(Self {
            config,
            repository,
            fetcher,
        })
    }

    /// Run one scheduled collection pass: advance the feed cursor, fetch
    /// each selected feed, count its words, and persist the results.
    ///
    /// Individual feed failures (network, parse, storage) are logged and
    /// skipped; they never abort the rest of the batch.
    pub async fn run(&self, use_cache: bool, combined: bool) -> Result<()> {
        let feeds = config::load_feeds(&self.config.feeds_path())?;
        if feeds.is_empty() {
            tracing::info!("No feeds configured; nothing to collect");
            return Ok(());
        }
        let stopwords = config::load_stopwords(&self.config.stopwords_path())?;

        let state_path = self.config.state_path();
        let state = scheduler::load_state(&state_path);
        let plan = scheduler::plan_cycle(&state, feeds.len(), self.config.max_feeds_per_run);

        // The cursor is persisted before processing: a crash mid-run skips
        // the rest of this window and the next cycle revisits every feed.
        scheduler::save_state(&state_path, &plan.next)?;
        tracing::info!(
            "Processing {} of {} feeds from index {} (cycle {})",
            plan.indices.len(),
            feeds.len(),
            state.last_index,
            if plan.next.cycle_completed {
                "completed"
            } else {
                "continuing"
            }
        );

        let mut log = Vec::new();
        let mut all_text = String::new();
        let mut all_articles = Vec::new();

        for (position, &index) in plan.indices.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.feed_delay_ms)).await;
            }

            let feed = &feeds[index];
            let entry = self
                .process_feed(feed, &stopwords, use_cache, &mut all_text, &mut all_articles)
                .await;
            log.push(entry);
        }

        if combined && !all_text.is_empty() {
            let counts = text::count_words(&all_text, &stopwords);
            let total = text::total_words(&counts);
            match self
                .repository
                .store_collection(COMBINED_FEED_NAME, all_articles, counts)
                .await
            {
                Ok(id) => tracing::info!(
                    "Stored combined collection {} ({} words)",
                    id,
                    total
                ),
                Err(e) => tracing::error!("Failed to store combined collection: {}", e),
            }
        }

        for entry in &log {
            tracing::info!(
                "Feed {}: {} articles, {} words in {:.2}s ({})",
                entry.feed,
                entry.articles,
                entry.words,
                entry.elapsed.as_secs_f64(),
                if entry.ok { "success" } else { "failed" }
            );
        }
        Ok(())
    }

    async fn process_feed(
        &self,
        feed: &FeedSource,
        stopwords: &HashSet<String>,
        use_cache: bool,
        all_text: &mut String,
        all_articles: &mut Vec<ExtractedArticle>,
    ) -> ProcessingEntry {
        let started = Instant::now();
        let mut entry = ProcessingEntry {
            feed: feed.name.clone(),
            articles: 0,
            words: 0,
            elapsed: Duration::ZERO,
            ok: false,
        };

        let raw = match self.fetcher.fetch(&feed.url, use_cache).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Feed {} unavailable this cycle: {}", feed.name, e);
                entry.elapsed = started.elapsed();
                return entry;
            }
        };

        let content = extract_text(&raw, self.config.titles_only);
        let articles = extract_articles(&raw, &feed.name);
        let counts = text::count_words(&content, stopwords);

        // Feeds that parsed to nothing contribute no text, so an all-empty
        // run stores no combined aggregate.
        if !content.is_empty() {
            all_text.push(' ');
            all_text.push_str(&content);
        }
        all_articles.extend(articles.iter().cloned());

        entry.articles = articles.len();
        entry.words = text::total_words(&counts);

        match self
            .repository
            .store_collection(&feed.name, articles, counts)
            .await
        {
            Ok(_) => entry.ok = true,
            Err(e) => {
                // One feed's storage failure must not abort the batch.
                tracing::error!("Failed to store collection for {}: {}", feed.name, e);
            }
        }

        entry.elapsed = started.elapsed();
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.join("data").to_string_lossy().to_string(),
            cache_dir: dir.join("cache").to_string_lossy().to_string(),
            logs_dir: dir.join("logs").to_string_lossy().to_string(),
            max_feeds_per_run: 2,
            feed_delay_ms: 0,
            ..Config::default()
        }
    }

    async fn collector_in(dir: &std::path::Path) -> Collector {
        let config = test_config(dir);
        for d in [&config.data_dir, &config.cache_dir, &config.logs_dir] {
            std::fs::create_dir_all(d).unwrap();
        }
        let repo = Repository::new(config.db_path().to_str().unwrap())
            .await
            .unwrap();
        Collector::new(config, repo).unwrap()
    }

    fn write_feeds(config: &Config, feeds: &[(&str, &str)]) {
        let list: Vec<serde_json::Value> = feeds
            .iter()
            .map(|(url, name)| serde_json::json!({"url": url, "name": name}))
            .collect();
        std::fs::write(
            config.feeds_path(),
            serde_json::json!({ "feeds": list }).to_string(),
        )
        .unwrap();
    }

    fn seed_cache(config: &Config, url: &str, body: &str) {
        let digest = Sha256::digest(url.as_bytes());
        let path =
            std::path::Path::new(&config.cache_dir).join(format!("{}.xml", hex::encode(digest)));
        std::fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn no_feeds_is_a_clean_exit() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_in(dir.path()).await;
        collector.run(true, false).await.unwrap();
        assert!(!collector.config.state_path().exists());
    }

    #[tokio::test]
    async fn unreachable_feeds_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_in(dir.path()).await;
        write_feeds(
            &collector.config,
            &[
                ("http://127.0.0.1:1/a.xml", "A"),
                ("http://127.0.0.1:1/b.xml", "B"),
                ("http://127.0.0.1:1/c.xml", "C"),
            ],
        );

        collector.run(true, false).await.unwrap();

        // Cursor advanced past the two attempted feeds despite failures.
        let state = scheduler::load_state(&collector.config.state_path());
        assert_eq!(state.last_index, 2);
        assert!(collector.repository.recent_collections(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn contentless_feeds_store_no_combined_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_in(dir.path()).await;
        let url_a = "http://127.0.0.1:1/empty-a.xml";
        let url_b = "http://127.0.0.1:1/empty-b.xml";
        write_feeds(&collector.config, &[(url_a, "Empty A"), (url_b, "Empty B")]);
        seed_cache(&collector.config, url_a, "<rss><channel></channel></rss>");
        seed_cache(&collector.config, url_b, "<html><body>not a feed</body></html>");

        collector.run(true, true).await.unwrap();

        let recent = collector.repository.recent_collections(10).await.unwrap();
        let names: Vec<&str> = recent.iter().map(|c| c.feed_name.as_str()).collect();
        assert!(!names.contains(&COMBINED_FEED_NAME));
    }

    #[tokio::test]
    async fn cached_feed_flows_into_storage() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector_in(dir.path()).await;
        let url = "http://127.0.0.1:1/cached.xml";
        write_feeds(&collector.config, &[(url, "Cached Feed")]);
        seed_cache(
            &collector.config,
            url,
            "<rss><item><title>Budget budget vote</title></item></rss>",
        );

        collector.run(true, true).await.unwrap();

        let recent = collector.repository.recent_collections(10).await.unwrap();
        // One per-feed collection plus the combined aggregate.
        assert_eq!(recent.len(), 2);
        let names: Vec<&str> = recent.iter().map(|c| c.feed_name.as_str()).collect();
        assert!(names.contains(&"Cached Feed"));
        assert!(names.contains(&COMBINED_FEED_NAME));

        let top = collector
            .repository
            .feed_top_words("Cached Feed", 7, 5)
            .await
            .unwrap();
        assert_eq!(top[0].word, "budget");
        assert_eq!(top[0].total_count, 2);
    }
}
