use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    BucketStat, CoOccurrence, CollectionSummary, DecliningWord, EmergingWord, ExtractedArticle,
    FeedActivity, FeedMentions, FeedPerformance, RecentCollection, StoredArticle, StoreStats,
    TopWord, TrendPoint, TrendingWord, WordRank, WordVelocity,
};

use super::schema::SCHEMA;

/// Maximum rows returned by the article keyword search.
const SEARCH_PAGE_SIZE: i64 = 50;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Write path

    /// Persist one collection run atomically: the summary row, every word
    /// count, and every article, or nothing at all on failure.
    pub async fn store_collection(
        &self,
        feed_name: &str,
        articles: Vec<ExtractedArticle>,
        word_counts: Vec<(String, u32)>,
    ) -> Result<i64> {
        let feed_name = feed_name.to_string();
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let total_words: i64 = word_counts.iter().map(|(_, c)| *c as i64).sum();
                tx.execute(
                    "INSERT INTO collections (feed_name, total_articles, total_words) VALUES (?1, ?2, ?3)",
                    params![feed_name, articles.len() as i64, total_words],
                )?;
                let collection_id = tx.last_insert_rowid();

                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO word_history (collection_id, word, count, feed_name) VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (word, count) in &word_counts {
                        stmt.execute(params![collection_id, word, count, feed_name])?;
                    }

                    let mut stmt = tx.prepare(
                        "INSERT INTO articles (collection_id, title, link, description, feed_name, pub_date) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for article in &articles {
                        stmt.execute(params![
                            collection_id,
                            article.title,
                            article.link,
                            article.description,
                            article.feed,
                            article.pub_date,
                        ])?;
                    }
                }

                tx.commit()?;
                Ok(collection_id)
            })
            .await?;
        Ok(id)
    }

    // Query surface consumed by dashboards and the analytics job.
    // Every time window is bound as a parameter, never spliced into SQL.

    pub async fn recent_collections(&self, limit: i64) -> Result<Vec<RecentCollection>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT feed_name, total_articles, total_words, timestamp
                     FROM collections ORDER BY timestamp DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok(RecentCollection {
                            feed_name: row.get(0)?,
                            total_articles: row.get(1)?,
                            total_words: row.get(2)?,
                            timestamp: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn feed_activity(&self, days: i64) -> Result<Vec<FeedActivity>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT feed_name,
                            COUNT(*) AS collection_count,
                            COALESCE(SUM(total_articles), 0),
                            COALESCE(SUM(total_words), 0),
                            COALESCE(AVG(total_articles), 0),
                            MAX(timestamp)
                     FROM collections
                     WHERE timestamp > datetime('now', '-' || ?1 || ' days')
                     GROUP BY feed_name
                     ORDER BY collection_count DESC",
                )?;
                let rows = stmt
                    .query_map(params![days], |row| {
                        Ok(FeedActivity {
                            feed_name: row.get(0)?,
                            collection_count: row.get(1)?,
                            total_articles: row.get(2)?,
                            total_words: row.get(3)?,
                            avg_articles: row.get(4)?,
                            last_collection: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Collection volume over time, bucketed hourly for short windows
    /// (≤ 48h) and daily otherwise. Optionally restricted to one feed.
    pub async fn bucket_stats(
        &self,
        window_hours: i64,
        feed: Option<String>,
    ) -> Result<Vec<BucketStat>> {
        let bucket = if window_hours <= 48 {
            "strftime('%Y-%m-%d %H:00', timestamp)"
        } else {
            "DATE(timestamp)"
        };
        let filter = if feed.is_some() {
            " AND feed_name = ?2"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {bucket} AS bucket,
                    COUNT(*),
                    COALESCE(SUM(total_articles), 0),
                    COALESCE(SUM(total_words), 0)
             FROM collections
             WHERE timestamp > datetime('now', '-' || ?1 || ' hours'){filter}
             GROUP BY bucket
             ORDER BY bucket"
        );

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = match &feed {
                    Some(f) => stmt
                        .query_map(params![window_hours, f], bucket_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map(params![window_hours], bucket_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Daily total mentions of one word, oldest bucket first.
    pub async fn word_trend_series(
        &self,
        word: &str,
        days: i64,
        feed: Option<String>,
    ) -> Result<Vec<TrendPoint>> {
        let word = word.to_string();
        let filter = if feed.is_some() {
            " AND feed_name = ?3"
        } else {
            ""
        };
        let sql = format!(
            "SELECT DATE(timestamp) AS date, SUM(count) AS total_count
             FROM word_history
             WHERE word = ?1 AND timestamp > datetime('now', '-' || ?2 || ' days'){filter}
             GROUP BY DATE(timestamp)
             ORDER BY date"
        );

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let map = |row: &Row<'_>| -> rusqlite::Result<TrendPoint> {
                    Ok(TrendPoint {
                        date: row.get(0)?,
                        total_count: row.get(1)?,
                    })
                };
                let rows = match &feed {
                    Some(f) => stmt
                        .query_map(params![word, days, f], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map(params![word, days], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Words above the minimum mention threshold in the window, ranked by
    /// volume then feed breadth.
    pub async fn trending_words(&self, days: i64, limit: i64) -> Result<Vec<WordRank>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT word, SUM(count) AS total_count, COUNT(DISTINCT feed_name) AS feed_count
                     FROM word_history
                     WHERE timestamp > datetime('now', '-' || ?1 || ' days')
                     GROUP BY word
                     HAVING total_count > 5
                     ORDER BY total_count DESC, feed_count DESC
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![days, limit], |row| {
                        Ok(WordRank {
                            word: row.get(0)?,
                            total_count: row.get(1)?,
                            feed_count: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Week-over-week change for words active in the current 7-day window,
    /// ranked by steepest rise.
    pub async fn trending_with_change(&self, limit: i64) -> Result<Vec<TrendingWord>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT w1.word,
                            SUM(w1.count) AS current_week,
                            COALESCE(w2.prev_week, 0) AS prev_week,
                            ROUND((SUM(w1.count) - COALESCE(w2.prev_week, 0)) * 100.0
                                  / MAX(COALESCE(w2.prev_week, 1), 1), 2) AS change_percent,
                            COUNT(DISTINCT w1.feed_name) AS feed_count
                     FROM word_history w1
                     LEFT JOIN (
                         SELECT word, SUM(count) AS prev_week
                         FROM word_history
                         WHERE timestamp BETWEEN datetime('now', '-14 days')
                                             AND datetime('now', '-7 days')
                         GROUP BY word
                     ) w2 ON w1.word = w2.word
                     WHERE w1.timestamp > datetime('now', '-7 days')
                     GROUP BY w1.word
                     HAVING current_week > 10
                     ORDER BY change_percent DESC, current_week DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![limit], |row| {
                        Ok(TrendingWord {
                            word: row.get(0)?,
                            current_week: row.get(1)?,
                            prev_week: row.get(2)?,
                            change_percent: row.get(3)?,
                            feed_count: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Words present in the last 3 days at or above `threshold` that were
    /// completely absent from the preceding 27 days.
    pub async fn emerging_words(&self, threshold: i64) -> Result<Vec<EmergingWord>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT w1.word,
                            SUM(w1.count) AS recent_count,
                            COUNT(DISTINCT w1.feed_name) AS feed_count,
                            MIN(w1.timestamp) AS first_appearance
                     FROM word_history w1
                     WHERE w1.timestamp > datetime('now', '-3 days')
                     AND w1.word NOT IN (
                         SELECT DISTINCT word
                         FROM word_history
                         WHERE timestamp BETWEEN datetime('now', '-30 days')
                                             AND datetime('now', '-3 days')
                     )
                     GROUP BY w1.word
                     HAVING recent_count >= ?1
                     ORDER BY recent_count DESC, feed_count DESC
                     LIMIT 20",
                )?;
                let rows = stmt
                    .query_map(params![threshold], |row| {
                        Ok(EmergingWord {
                            word: row.get(0)?,
                            recent_count: row.get(1)?,
                            feed_count: row.get(2)?,
                            first_appearance: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Words whose prior-week volume exceeded 20 and whose current week is
    /// strictly less than half of it, steepest decline first.
    pub async fn declining_words(&self) -> Result<Vec<DecliningWord>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT w2.word,
                            w2.prev_count,
                            COALESCE(w1.recent_count, 0) AS recent_count,
                            ROUND((COALESCE(w1.recent_count, 0) - w2.prev_count) * 100.0
                                  / w2.prev_count, 2) AS decline_percent
                     FROM (
                         SELECT word, SUM(count) AS prev_count
                         FROM word_history
                         WHERE timestamp BETWEEN datetime('now', '-14 days')
                                             AND datetime('now', '-7 days')
                         GROUP BY word
                         HAVING prev_count > 20
                     ) w2
                     LEFT JOIN (
                         SELECT word, SUM(count) AS recent_count
                         FROM word_history
                         WHERE timestamp > datetime('now', '-7 days')
                         GROUP BY word
                     ) w1 ON w2.word = w1.word
                     WHERE COALESCE(w1.recent_count, 0) < w2.prev_count * 0.5
                     ORDER BY decline_percent ASC
                     LIMIT 15",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(DecliningWord {
                            word: row.get(0)?,
                            prev_count: row.get(1)?,
                            recent_count: row.get(2)?,
                            decline_percent: row.get(3)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Today's per-feed collection volume.
    pub async fn feed_performance(&self) -> Result<Vec<FeedPerformance>> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT feed_name,
                            COUNT(*) AS collections_today,
                            COALESCE(SUM(total_articles), 0) AS articles_today,
                            COALESCE(SUM(total_words), 0),
                            COALESCE(AVG(total_articles), 0),
                            MAX(timestamp)
                     FROM collections
                     WHERE DATE(timestamp) = DATE('now')
                     GROUP BY feed_name
                     ORDER BY collections_today DESC, articles_today DESC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(FeedPerformance {
                            feed_name: row.get(0)?,
                            collections_today: row.get(1)?,
                            articles_today: row.get(2)?,
                            words_today: row.get(3)?,
                            avg_articles: row.get(4)?,
                            last_collection: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn collection_summary(&self) -> Result<CollectionSummary> {
        let summary = self
            .conn
            .call(|conn| {
                let summary = conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(total_articles), 0),
                            COALESCE(SUM(total_words), 0),
                            COUNT(DISTINCT feed_name),
                            MIN(timestamp),
                            MAX(timestamp)
                     FROM collections
                     WHERE DATE(timestamp) = DATE('now')",
                    [],
                    |row| {
                        Ok(CollectionSummary {
                            total_collections: row.get(0)?,
                            total_articles: row.get(1)?,
                            total_words: row.get(2)?,
                            active_feeds: row.get(3)?,
                            first_collection: row.get(4)?,
                            last_collection: row.get(5)?,
                        })
                    },
                )?;
                Ok(summary)
            })
            .await?;
        Ok(summary)
    }

    /// Distinct-vocabulary counts for today and yesterday. The percent
    /// velocity is derived by the caller and omitted when yesterday is zero.
    pub async fn word_velocity(&self) -> Result<WordVelocity> {
        let mut velocity = self
            .conn
            .call(|conn| {
                let row = conn.query_row(
                    "SELECT COUNT(DISTINCT word),
                            COALESCE(AVG(count), 0),
                            (SELECT COUNT(DISTINCT word)
                             FROM word_history
                             WHERE DATE(timestamp) = DATE('now', '-1 day'))
                     FROM word_history
                     WHERE DATE(timestamp) = DATE('now')",
                    [],
                    |row| {
                        Ok(WordVelocity {
                            unique_words_today: row.get(0)?,
                            avg_word_frequency: row.get(1)?,
                            unique_words_yesterday: row.get(2)?,
                            velocity: None,
                        })
                    },
                )?;
                Ok(row)
            })
            .await?;

        if velocity.unique_words_yesterday > 0 {
            let change = (velocity.unique_words_today - velocity.unique_words_yesterday) as f64
                * 100.0
                / velocity.unique_words_yesterday as f64;
            velocity.velocity = Some((change * 100.0).round() / 100.0);
        }
        Ok(velocity)
    }

    /// Words with enough distinct active days in the last `days` to fit a
    /// regression line.
    pub async fn words_with_min_points(&self, days: i64, min_points: i64) -> Result<Vec<String>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT word, COUNT(DISTINCT DATE(timestamp)) AS points
                     FROM word_history
                     WHERE timestamp > datetime('now', '-' || ?1 || ' days')
                     GROUP BY word
                     HAVING points >= ?2",
                )?;
                let rows = stmt
                    .query_map(params![days, min_points], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Per-feed mention totals and distinct active days for one word.
    pub async fn word_feed_breakdown(&self, word: &str, days: i64) -> Result<Vec<FeedMentions>> {
        let word = word.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT feed_name,
                            SUM(count) AS mentions,
                            COUNT(DISTINCT DATE(timestamp)) AS active_days
                     FROM word_history
                     WHERE word = ?1 AND timestamp > datetime('now', '-' || ?2 || ' days')
                     GROUP BY feed_name
                     ORDER BY mentions DESC",
                )?;
                let rows = stmt
                    .query_map(params![word, days], |row| {
                        Ok(FeedMentions {
                            feed_name: row.get(0)?,
                            mentions: row.get(1)?,
                            active_days: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn feed_top_words(
        &self,
        feed: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<TopWord>> {
        let feed = feed.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT word, SUM(count) AS total_count
                     FROM word_history
                     WHERE feed_name = ?1
                     AND timestamp > datetime('now', '-' || ?2 || ' days')
                     GROUP BY word
                     ORDER BY total_count DESC
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![feed, days, limit], |row| {
                        Ok(TopWord {
                            word: row.get(0)?,
                            total_count: row.get(1)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Other words appearing in the same collections as `word`, ranked by
    /// number of shared collections, then total mentions.
    pub async fn cooccurring_words(
        &self,
        word: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<CoOccurrence>> {
        let word = word.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT w2.word,
                            COUNT(DISTINCT w2.collection_id) AS shared_collections,
                            SUM(w2.count) AS total_mentions
                     FROM word_history w1
                     JOIN word_history w2
                       ON w1.collection_id = w2.collection_id AND w2.word != w1.word
                     WHERE w1.word = ?1
                     AND w1.timestamp > datetime('now', '-' || ?2 || ' days')
                     GROUP BY w2.word
                     ORDER BY shared_collections DESC, total_mentions DESC
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![word, days, limit], |row| {
                        Ok(CoOccurrence {
                            word: row.get(0)?,
                            shared_collections: row.get(1)?,
                            total_mentions: row.get(2)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Case-insensitive substring search across article text and feed
    /// names, newest first, capped at one page.
    pub async fn search_articles(
        &self,
        keyword: &str,
        feed: Option<String>,
    ) -> Result<Vec<StoredArticle>> {
        let pattern = format!("%{}%", keyword);
        let filter = if feed.is_some() {
            " AND feed_name = ?2"
        } else {
            ""
        };
        let sql = format!(
            "SELECT title, link, description, feed_name, timestamp
             FROM articles
             WHERE (title LIKE ?1 OR description LIKE ?1 OR feed_name LIKE ?1){filter}
             ORDER BY timestamp DESC
             LIMIT {SEARCH_PAGE_SIZE}"
        );

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = match &feed {
                    Some(f) => stmt
                        .query_map(params![pattern, f], article_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                    None => stmt
                        .query_map(params![pattern], article_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?,
                };
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Recent articles from collections in which `word` occurred.
    pub async fn articles_for_word(
        &self,
        word: &str,
        days: i64,
        limit: i64,
    ) -> Result<Vec<StoredArticle>> {
        let word = word.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT a.title, a.link, a.description, a.feed_name, a.timestamp
                     FROM articles a
                     JOIN word_history wh ON a.collection_id = wh.collection_id
                     WHERE wh.word = ?1
                     AND a.timestamp > datetime('now', '-' || ?2 || ' days')
                     ORDER BY a.timestamp DESC
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![word, days, limit], article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    pub async fn store_stats(&self) -> Result<StoreStats> {
        let stats = self
            .conn
            .call(|conn| {
                let stats = conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM collections),
                            (SELECT COUNT(*) FROM word_history),
                            (SELECT COUNT(*) FROM articles),
                            (SELECT COUNT(DISTINCT word) FROM word_history),
                            (SELECT COUNT(DISTINCT feed_name) FROM collections),
                            (SELECT MIN(timestamp) FROM collections),
                            (SELECT MAX(timestamp) FROM collections)",
                    [],
                    |row| {
                        Ok(StoreStats {
                            collections: row.get(0)?,
                            word_rows: row.get(1)?,
                            articles: row.get(2)?,
                            distinct_words: row.get(3)?,
                            distinct_feeds: row.get(4)?,
                            first_collection: row.get(5)?,
                            last_collection: row.get(6)?,
                        })
                    },
                )?;
                Ok(stats)
            })
            .await?;
        Ok(stats)
    }

    // Retention

    /// Delete rows older than the retention horizon. Returns deleted
    /// (collections, word rows, articles).
    pub async fn purge_older_than(&self, days: i64) -> Result<(usize, usize, usize)> {
        let counts = self
            .conn
            .call(move |conn| {
                let words = conn.execute(
                    "DELETE FROM word_history WHERE timestamp < datetime('now', '-' || ?1 || ' days')",
                    params![days],
                )?;
                let collections = conn.execute(
                    "DELETE FROM collections WHERE timestamp < datetime('now', '-' || ?1 || ' days')",
                    params![days],
                )?;
                let articles = conn.execute(
                    "DELETE FROM articles WHERE timestamp < datetime('now', '-' || ?1 || ' days')",
                    params![days],
                )?;
                Ok((collections, words, articles))
            })
            .await?;
        Ok(counts)
    }

    /// Reclaim space and refresh planner statistics after a purge.
    pub async fn compact(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("VACUUM; ANALYZE;")?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn bucket_from_row(row: &Row<'_>) -> rusqlite::Result<BucketStat> {
    Ok(BucketStat {
        bucket: row.get(0)?,
        collections: row.get(1)?,
        articles: row.get(2)?,
        words: row.get(3)?,
    })
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
    Ok(StoredArticle {
        title: row.get(0)?,
        link: row.get(1)?,
        description: row.get(2)?,
        feed_name: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        (dir, repo)
    }

    fn article(title: &str, feed: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            description: format!("about {}", title),
            feed: feed.to_string(),
            pub_date: String::new(),
        }
    }

    /// Insert a word_history row with a timestamp shifted into the past.
    async fn backdated_word(repo: &Repository, word: &str, count: i64, feed: &str, days_ago: i64) {
        let word = word.to_string();
        let feed = feed.to_string();
        repo.conn
            .call(move |conn| {
                // Each synthetic row gets its own collection id so repeated
                // words do not trip UNIQUE(collection_id, word). The backdated
                // parent row satisfies the collection_id foreign key.
                conn.execute(
                    "INSERT INTO collections (feed_name, timestamp)
                     VALUES (?1, datetime('now', '-' || ?2 || ' days'))",
                    params![feed, days_ago],
                )?;
                let collection_id = conn.last_insert_rowid();
                conn.execute(
                    "INSERT INTO word_history (collection_id, word, count, feed_name, timestamp)
                     VALUES (?1, ?2, ?3, ?4, datetime('now', '-' || ?5 || ' days'))",
                    params![collection_id, word, count, feed, days_ago],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    async fn table_count(repo: &Repository, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        repo.conn
            .call(move |conn| {
                let n = conn.query_row(&sql, [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stores_collection_with_matching_totals() {
        let (_dir, repo) = open_repo().await;
        let counts = vec![("quick".to_string(), 3u32), ("fox".to_string(), 2u32)];
        let articles = vec![article("one", "Feed A"), article("two", "Feed A")];

        let id = repo
            .store_collection("Feed A", articles, counts)
            .await
            .unwrap();
        assert!(id > 0);

        let recent = repo.recent_collections(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].feed_name, "Feed A");
        assert_eq!(recent[0].total_articles, 2);
        assert_eq!(recent[0].total_words, 5);

        assert_eq!(table_count(&repo, "word_history").await, 2);
        assert_eq!(table_count(&repo, "articles").await, 2);
    }

    #[tokio::test]
    async fn failed_store_leaves_no_rows() {
        let (_dir, repo) = open_repo().await;

        // A duplicate word violates UNIQUE(collection_id, word) partway
        // through the word inserts; the whole transaction must roll back.
        let counts = vec![
            ("alpha".to_string(), 1u32),
            ("beta".to_string(), 2u32),
            ("alpha".to_string(), 3u32),
        ];
        let result = repo
            .store_collection("Feed A", vec![article("x", "Feed A")], counts)
            .await;
        assert!(result.is_err());

        assert_eq!(table_count(&repo, "collections").await, 0);
        assert_eq!(table_count(&repo, "word_history").await, 0);
        assert_eq!(table_count(&repo, "articles").await, 0);
    }

    #[tokio::test]
    async fn trending_requires_minimum_volume() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection(
            "Feed A",
            vec![],
            vec![("popular".to_string(), 9), ("rare".to_string(), 2)],
        )
        .await
        .unwrap();

        let trending = repo.trending_words(7, 20).await.unwrap();
        assert_eq!(trending.len(), 1);
        assert_eq!(trending[0].word, "popular");
        assert_eq!(trending[0].total_count, 9);
        assert_eq!(trending[0].feed_count, 1);
    }

    #[tokio::test]
    async fn emerging_excludes_previously_seen_words() {
        let (_dir, repo) = open_repo().await;

        // Brand new word: 25 mentions in the last 3 days, nothing before.
        backdated_word(&repo, "novelty", 25, "Feed A", 1).await;
        // Old word: high recent volume but one prior mention on day 10.
        backdated_word(&repo, "veteran", 40, "Feed A", 1).await;
        backdated_word(&repo, "veteran", 1, "Feed B", 10).await;

        let emerging = repo.emerging_words(20).await.unwrap();
        let words: Vec<&str> = emerging.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["novelty"]);
        assert_eq!(emerging[0].recent_count, 25);
    }

    #[tokio::test]
    async fn declining_uses_strict_half_boundary() {
        let (_dir, repo) = open_repo().await;

        // prev week 100, current 40 -> -60%, reported.
        backdated_word(&repo, "fading", 100, "Feed A", 10).await;
        backdated_word(&repo, "fading", 40, "Feed A", 2).await;
        // prev week 100, current 60 -> exactly above half, excluded.
        backdated_word(&repo, "steady", 100, "Feed A", 10).await;
        backdated_word(&repo, "steady", 60, "Feed A", 2).await;
        // prev week 100, current exactly 50 -> boundary, excluded.
        backdated_word(&repo, "borderline", 100, "Feed A", 10).await;
        backdated_word(&repo, "borderline", 50, "Feed A", 2).await;

        let declining = repo.declining_words().await.unwrap();
        assert_eq!(declining.len(), 1);
        assert_eq!(declining[0].word, "fading");
        assert_eq!(declining[0].prev_count, 100);
        assert_eq!(declining[0].recent_count, 40);
        assert!((declining[0].decline_percent - -60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn week_over_week_change_is_computed() {
        let (_dir, repo) = open_repo().await;
        backdated_word(&repo, "riser", 5, "Feed A", 10).await;
        backdated_word(&repo, "riser", 15, "Feed A", 2).await;

        let rows = repo.trending_with_change(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].word, "riser");
        assert_eq!(rows[0].current_week, 15);
        assert_eq!(rows[0].prev_week, 5);
        assert!((rows[0].change_percent - 200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn bucket_stats_switch_granularity() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection("Feed A", vec![], vec![("word".to_string(), 6)])
            .await
            .unwrap();

        let hourly = repo.bucket_stats(24, None).await.unwrap();
        assert_eq!(hourly.len(), 1);
        // Hourly buckets carry an hour component.
        assert!(hourly[0].bucket.contains(":00"));

        let daily = repo.bucket_stats(24 * 7, None).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert!(!daily[0].bucket.contains(":"));

        let filtered = repo
            .bucket_stats(24, Some("Feed B".to_string()))
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn cooccurrence_ranks_by_shared_collections() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection(
            "Feed A",
            vec![],
            vec![("target".to_string(), 1), ("partner".to_string(), 5)],
        )
        .await
        .unwrap();
        repo.store_collection(
            "Feed B",
            vec![],
            vec![("target".to_string(), 1), ("partner".to_string(), 1)],
        )
        .await
        .unwrap();
        repo.store_collection(
            "Feed C",
            vec![],
            vec![("target".to_string(), 1), ("stranger".to_string(), 9)],
        )
        .await
        .unwrap();

        let related = repo.cooccurring_words("target", 7, 10).await.unwrap();
        assert_eq!(related[0].word, "partner");
        assert_eq!(related[0].shared_collections, 2);
        assert_eq!(related[1].word, "stranger");
        assert_eq!(related[1].shared_collections, 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_bounded() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection(
            "World News",
            vec![article("Election Results", "World News")],
            vec![],
        )
        .await
        .unwrap();

        let hits = repo.search_articles("election", None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Election Results");

        let by_feed = repo
            .search_articles("election", Some("Other Feed".to_string()))
            .await
            .unwrap();
        assert!(by_feed.is_empty());
    }

    #[tokio::test]
    async fn word_details_and_top_words() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection(
            "Feed A",
            vec![article("budget talks", "Feed A")],
            vec![("budget".to_string(), 4), ("talks".to_string(), 2)],
        )
        .await
        .unwrap();

        let breakdown = repo.word_feed_breakdown("budget", 7).await.unwrap();
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].feed_name, "Feed A");
        assert_eq!(breakdown[0].mentions, 4);
        assert_eq!(breakdown[0].active_days, 1);

        let top = repo.feed_top_words("Feed A", 7, 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].word, "budget");

        let linked = repo.articles_for_word("budget", 7, 10).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].title, "budget talks");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let (_dir, repo) = open_repo().await;
        repo.store_collection("Feed A", vec![], vec![("fresh".to_string(), 6)])
            .await
            .unwrap();
        backdated_word(&repo, "ancient", 3, "Feed A", 120).await;

        let (_, words, _) = repo.purge_older_than(90).await.unwrap();
        assert_eq!(words, 1);
        assert_eq!(table_count(&repo, "word_history").await, 1);

        repo.compact().await.unwrap();

        let stats = repo.store_stats().await.unwrap();
        assert_eq!(stats.collections, 1);
        assert_eq!(stats.distinct_words, 1);
    }

    #[tokio::test]
    async fn velocity_reflects_day_over_day_vocabulary() {
        let (_dir, repo) = open_repo().await;
        backdated_word(&repo, "yesterword", 2, "Feed A", 1).await;
        repo.store_collection(
            "Feed A",
            vec![],
            vec![("one".to_string(), 1), ("two".to_string(), 1)],
        )
        .await
        .unwrap();

        let velocity = repo.word_velocity().await.unwrap();
        assert_eq!(velocity.unique_words_today, 2);
        assert_eq!(velocity.unique_words_yesterday, 1);
        assert_eq!(velocity.velocity, Some(100.0));
    }

    #[tokio::test]
    async fn trend_series_orders_by_date() {
        let (_dir, repo) = open_repo().await;
        backdated_word(&repo, "series", 2, "Feed A", 3).await;
        backdated_word(&repo, "series", 5, "Feed A", 1).await;
        backdated_word(&repo, "series", 4, "Feed B", 1).await;

        let points = repo.word_trend_series("series", 30, None).await.unwrap();
        assert_eq!(points.len(), 2);
        assert!(points[0].date < points[1].date);
        assert_eq!(points[0].total_count, 2);
        assert_eq!(points[1].total_count, 9);

        let only_b = repo
            .word_trend_series("series", 30, Some("Feed B".to_string()))
            .await
            .unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].total_count, 4);
    }
}
