pub const SCHEMA: &str = r#"
-- collections table: one fetch-and-count run per feed (or aggregate)
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL DEFAULT (datetime('now')),
    feed_name TEXT NOT NULL,
    total_articles INTEGER NOT NULL DEFAULT 0,
    total_words INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_collections_timestamp ON collections(timestamp);

-- word_history table: per-word per-collection frequency ledger.
-- Counts are pre-aggregated, so a word appears at most once per collection.
CREATE TABLE IF NOT EXISTS word_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    word TEXT NOT NULL,
    count INTEGER NOT NULL,
    feed_name TEXT NOT NULL,
    timestamp TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(collection_id, word)
);

CREATE INDEX IF NOT EXISTS idx_word_history_word ON word_history(word);
CREATE INDEX IF NOT EXISTS idx_word_history_timestamp ON word_history(timestamp);

-- articles table: articles captured during a collection
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    title TEXT NOT NULL,
    link TEXT,
    description TEXT,
    feed_name TEXT NOT NULL,
    pub_date TEXT,
    timestamp TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_collection_id ON articles(collection_id);
CREATE INDEX IF NOT EXISTS idx_articles_timestamp ON articles(timestamp);
"#;
