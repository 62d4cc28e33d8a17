pub mod extract;
pub mod fetcher;

pub use extract::{extract_articles, extract_text};
pub use fetcher::FeedFetcher;
