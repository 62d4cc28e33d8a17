use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;

use crate::config::{self, Config};
use crate::db::Repository;
use crate::error::Result;
use crate::models::{
    Alert, AlertKind, DailyAnalysis, TopicShift, TrendCoefficient, TrendingWord,
};

/// Most recent alerts retained in the alerts log.
const MAX_ALERTS: usize = 500;

/// Minimum daily data points required before fitting a trend line.
const MIN_TREND_POINTS: usize = 5;

/// Static keyword buckets used for topic-shift detection.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "politics",
        &["election", "vote", "campaign", "candidate", "political", "government", "policy"],
    ),
    (
        "economy",
        &["market", "stock", "economic", "financial", "price", "inflation", "recession"],
    ),
    (
        "technology",
        &["tech", "ai", "artificial", "digital", "cyber", "internet", "software"],
    ),
    (
        "health",
        &["health", "medical", "vaccine", "disease", "hospital", "treatment", "pandemic"],
    ),
    (
        "climate",
        &["climate", "environmental", "weather", "temperature", "carbon", "renewable"],
    ),
];

pub struct Analyzer {
    config: Config,
    repository: Repository,
}

impl Analyzer {
    pub fn new(config: Config, repository: Repository) -> Self {
        Self { config, repository }
    }

    /// Run the daily analysis batch: derive every trend signal, write the
    /// daily snapshot, append alerts, and refresh trend coefficients.
    ///
    /// Each section degrades to empty on query failure; an unreachable
    /// table never aborts the whole job.
    pub async fn run(&self) -> Result<()> {
        let started = std::time::Instant::now();
        tracing::info!("Starting daily analysis");

        let trending = self
            .repository
            .trending_with_change(50)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to analyze trending words: {}", e);
                Vec::new()
            });
        let emerging = self.repository.emerging_words(20).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to detect emerging words: {}", e);
            Vec::new()
        });
        let declining = self.repository.declining_words().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to detect declining words: {}", e);
            Vec::new()
        });
        let feed_performance = self.repository.feed_performance().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to analyze feed performance: {}", e);
            Vec::new()
        });
        let collection_summary = self
            .repository
            .collection_summary()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to summarize collections: {}", e);
                Default::default()
            });
        let word_velocity = self.repository.word_velocity().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to calculate word velocity: {}", e);
            Default::default()
        });
        let topic_shifts = detect_topic_shifts(&trending);

        let now = Utc::now();
        let analysis = DailyAnalysis {
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            trending_words: trending,
            emerging_words: emerging,
            declining_words: declining,
            feed_performance,
            collection_summary,
            word_velocity,
            topic_shifts,
        };

        self.save_snapshot(&analysis)?;

        let missing_feeds = self.count_silent_feeds(&analysis);
        let alerts = build_alerts(&analysis, missing_feeds);
        if !alerts.is_empty() {
            append_alerts(&self.config.alerts_path(), alerts)?;
        }

        self.update_coefficients().await?;

        tracing::info!(
            "Daily analysis completed in {:.2}s",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    fn save_snapshot(&self, analysis: &DailyAnalysis) -> Result<()> {
        let dir = self.config.analysis_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("daily_{}.json", analysis.date));
        std::fs::write(&path, serde_json::to_string_pretty(analysis)?)?;
        tracing::info!("Daily analysis saved to {:?}", path);
        Ok(())
    }

    /// Configured feeds with no collection recorded today. The combined
    /// aggregate is synthetic and never counted.
    fn count_silent_feeds(&self, analysis: &DailyAnalysis) -> usize {
        let feeds = config::load_feeds(&self.config.feeds_path()).unwrap_or_default();
        feeds
            .iter()
            .filter(|feed| {
                !analysis
                    .feed_performance
                    .iter()
                    .any(|p| p.feed_name == feed.name)
            })
            .count()
    }

    /// Fit a least-squares line through each active word's daily counts
    /// over the last 30 days and cache the slopes for fast lookup.
    async fn update_coefficients(&self) -> Result<()> {
        let words = self
            .repository
            .words_with_min_points(30, MIN_TREND_POINTS as i64)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to list words for trend coefficients: {}", e);
                Vec::new()
            });

        let mut coefficients: BTreeMap<String, TrendCoefficient> = BTreeMap::new();
        let updated = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        for word in words {
            let series = match self.repository.word_trend_series(&word, 30, None).await {
                Ok(series) => series,
                Err(e) => {
                    tracing::warn!("Failed to get trend series for {}: {}", word, e);
                    continue;
                }
            };
            if series.len() < MIN_TREND_POINTS {
                continue;
            }
            let counts: Vec<i64> = series.iter().map(|p| p.total_count).collect();
            let slope = trend_coefficient(&counts);
            coefficients.insert(
                word,
                TrendCoefficient {
                    coefficient: (slope * 10_000.0).round() / 10_000.0,
                    updated: updated.clone(),
                },
            );
        }

        tracing::info!("Updated trend coefficients for {} words", coefficients.len());
        std::fs::write(
            self.config.coefficients_path(),
            serde_json::to_string_pretty(&coefficients)?,
        )?;
        Ok(())
    }
}

/// Ordinary least-squares slope of (day index, daily count) pairs.
/// Degenerate inputs (fewer than two points, zero variance in the index)
/// yield a slope of 0.
pub fn trend_coefficient(counts: &[i64]) -> f64 {
    let n = counts.len();
    if n < 2 {
        return 0.0;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    for (i, &y) in counts.iter().enumerate() {
        let x = i as f64;
        let y = y as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let n = n as f64;
    let denominator = n * sum_x2 - sum_x * sum_x;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denominator
}

/// A topic is rising when the average change of its matched trending
/// keywords exceeds 50%.
fn detect_topic_shifts(trending: &[TrendingWord]) -> Vec<TopicShift> {
    let mut shifts = Vec::new();

    for (topic, keywords) in TOPIC_KEYWORDS {
        let matched: Vec<&TrendingWord> = trending
            .iter()
            .filter(|w| keywords.contains(&w.word.to_lowercase().as_str()))
            .collect();
        if matched.is_empty() {
            continue;
        }

        let avg_change =
            matched.iter().map(|w| w.change_percent).sum::<f64>() / matched.len() as f64;
        if avg_change > 50.0 {
            shifts.push(TopicShift {
                topic: topic.to_string(),
                change_percent: (avg_change * 100.0).round() / 100.0,
                affected_words: matched.len(),
                trend: "rising".to_string(),
            });
        }
    }

    shifts
}

/// Derive operator alerts from one day's analysis.
pub fn build_alerts(analysis: &DailyAnalysis, missing_feeds: usize) -> Vec<Alert> {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut alerts = Vec::new();

    for word in &analysis.trending_words {
        if word.change_percent > 200.0 {
            alerts.push(Alert {
                message: format!(
                    "Word '{}' surged {}% this week",
                    word.word, word.change_percent
                ),
                kind: AlertKind::TrendingSpike {
                    word: word.word.clone(),
                    change: word.change_percent,
                },
                timestamp: timestamp.clone(),
            });
        }
    }

    if analysis.emerging_words.len() > 5 {
        alerts.push(Alert {
            message: format!(
                "{} new significant words detected",
                analysis.emerging_words.len()
            ),
            kind: AlertKind::EmergingCluster {
                count: analysis.emerging_words.len(),
            },
            timestamp: timestamp.clone(),
        });
    }

    if missing_feeds > 2 {
        alerts.push(Alert {
            message: format!("{} feeds failed to collect today", missing_feeds),
            kind: AlertKind::FeedFailures {
                count: missing_feeds,
            },
            timestamp: timestamp.clone(),
        });
    }

    for shift in &analysis.topic_shifts {
        alerts.push(Alert {
            message: format!(
                "Topic '{}' trending up {}%",
                shift.topic, shift.change_percent
            ),
            kind: AlertKind::TopicShift {
                topic: shift.topic.clone(),
                change: shift.change_percent,
            },
            timestamp: timestamp.clone(),
        });
    }

    alerts
}

/// Append alerts to the bounded log, keeping only the most recent entries.
pub fn append_alerts(path: &Path, new_alerts: Vec<Alert>) -> Result<()> {
    let mut all: Vec<Alert> = match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    let count = new_alerts.len();
    all.extend(new_alerts);
    if all.len() > MAX_ALERTS {
        all.drain(..all.len() - MAX_ALERTS);
    }

    std::fs::write(path, serde_json::to_string_pretty(&all)?)?;
    tracing::info!("Recorded {} change alerts", count);
    Ok(())
}
