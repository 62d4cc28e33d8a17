use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the externally managed feed list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub url: String,
    pub name: String,
}

/// On-disk shape of `feeds.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedList {
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
}

/// Article fields extracted from a feed document before storage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub link: String,
    pub description: String,
    pub feed: String,
    pub pub_date: String,
}

/// Stored article row as returned by search and word-detail queries.
#[derive(Debug, Clone, Serialize)]
pub struct StoredArticle {
    pub title: String,
    pub link: String,
    pub description: String,
    pub feed_name: String,
    pub timestamp: String,
}

/// Round-robin cursor over the feed list, persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    #[serde(default)]
    pub last_index: usize,
    #[serde(default)]
    pub cycle_count: u64,
    #[serde(default)]
    pub cycle_completed: bool,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

// ---- Query surface rows -------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RecentCollection {
    pub feed_name: String,
    pub total_articles: i64,
    pub total_words: i64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedActivity {
    pub feed_name: String,
    pub collection_count: i64,
    pub total_articles: i64,
    pub total_words: i64,
    pub avg_articles: f64,
    pub last_collection: String,
}

/// One time bucket of collection volume; hourly when the requested window
/// is short, daily otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct BucketStat {
    pub bucket: String,
    pub collections: i64,
    pub articles: i64,
    pub words: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WordRank {
    pub word: String,
    pub total_count: i64,
    pub feed_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedMentions {
    pub feed_name: String,
    pub mentions: i64,
    pub active_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopWord {
    pub word: String,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoOccurrence {
    pub word: String,
    pub shared_collections: i64,
    pub total_mentions: i64,
}

/// Row counts and coverage of the store, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub collections: i64,
    pub word_rows: i64,
    pub articles: i64,
    pub distinct_words: i64,
    pub distinct_feeds: i64,
    pub first_collection: Option<String>,
    pub last_collection: Option<String>,
}

// ---- Daily analysis -----------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TrendingWord {
    pub word: String,
    pub current_week: i64,
    pub prev_week: i64,
    pub change_percent: f64,
    pub feed_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergingWord {
    pub word: String,
    pub recent_count: i64,
    pub feed_count: i64,
    pub first_appearance: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecliningWord {
    pub word: String,
    pub prev_count: i64,
    pub recent_count: i64,
    pub decline_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedPerformance {
    pub feed_name: String,
    pub collections_today: i64,
    pub articles_today: i64,
    pub words_today: i64,
    pub avg_articles: f64,
    pub last_collection: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSummary {
    pub total_collections: i64,
    pub total_articles: i64,
    pub total_words: i64,
    pub active_feeds: i64,
    pub first_collection: Option<String>,
    pub last_collection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WordVelocity {
    pub unique_words_today: i64,
    pub unique_words_yesterday: i64,
    pub avg_word_frequency: f64,
    /// Percent change in distinct vocabulary day over day; absent when
    /// yesterday had no words at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicShift {
    pub topic: String,
    pub change_percent: f64,
    pub affected_words: usize,
    pub trend: String,
}

/// The daily analysis snapshot written for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct DailyAnalysis {
    pub date: String,
    pub timestamp: String,
    pub trending_words: Vec<TrendingWord>,
    pub emerging_words: Vec<EmergingWord>,
    pub declining_words: Vec<DecliningWord>,
    pub feed_performance: Vec<FeedPerformance>,
    pub collection_summary: CollectionSummary,
    pub word_velocity: WordVelocity,
    pub topic_shifts: Vec<TopicShift>,
}

// ---- Alerts & coefficients ----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    TrendingSpike { word: String, change: f64 },
    EmergingCluster { count: usize },
    FeedFailures { count: usize },
    TopicShift { topic: String, change: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(flatten)]
    pub kind: AlertKind,
    pub message: String,
    pub timestamp: String,
}

/// Least-squares slope of a word's daily counts, cached per analytics run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendCoefficient {
    pub coefficient: f64,
    pub updated: String,
}
