use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ExtractedArticle;

// Real-world feeds are frequently invalid XML, so extraction is deliberately
// pattern-based and permissive rather than schema-validated. Swapping in a
// strict parser only requires replacing this module.

static CDATA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<!\[CDATA\[(.*?)\]\]>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<item[^>]*>(.*?)</item>").unwrap());
static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry[^>]*>(.*?)</entry>").unwrap());

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static DESCRIPTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<description[^>]*>(.*?)</description>").unwrap());
static CONTENT_ENCODED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<content:encoded[^>]*>(.*?)</content:encoded>").unwrap());
static LINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<link[^>]*>(.*?)</link>").unwrap());
static PUB_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pubDate[^>]*>(.*?)</pubDate>").unwrap());

static SUMMARY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<summary[^>]*>(.*?)</summary>").unwrap());
static CONTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<content[ >](.*?)</content>").unwrap());
static ATOM_LINK_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<link[^>]*?href="(.*?)""#).unwrap());
static PUBLISHED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<published[^>]*>(.*?)</published>").unwrap());

/// Unwrap CDATA sections and decode HTML entities before pattern matching.
fn normalize(raw: &str) -> String {
    let without_cdata = CDATA_RE.replace_all(raw, "$1");
    html_escape::decode_html_entities(without_cdata.as_ref()).into_owned()
}

fn strip_tags(fragment: &str) -> String {
    TAG_RE.replace_all(fragment, "").trim().to_string()
}

fn capture(re: &Regex, block: &str) -> Option<String> {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| strip_tags(m.as_str()))
}

/// Concatenate the textual content of every item/entry in a feed document.
///
/// With `titles_only` set, only titles contribute; otherwise descriptions
/// and encoded content (RSS) or summaries and content (Atom) are included.
/// A document with no recognizable blocks yields an empty string.
pub fn extract_text(raw: &str, titles_only: bool) -> String {
    let doc = normalize(raw);
    let mut text = String::new();

    let items: Vec<&str> = ITEM_RE
        .captures_iter(&doc)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if !items.is_empty() {
        for item in items {
            if let Some(title) = capture(&TITLE_RE, item) {
                text.push(' ');
                text.push_str(&title);
            }
            if !titles_only {
                if let Some(desc) = capture(&DESCRIPTION_RE, item) {
                    text.push(' ');
                    text.push_str(&desc);
                }
                if let Some(content) = capture(&CONTENT_ENCODED_RE, item) {
                    text.push(' ');
                    text.push_str(&content);
                }
            }
        }
        return text;
    }

    let entries: Vec<&str> = ENTRY_RE
        .captures_iter(&doc)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if entries.is_empty() {
        tracing::warn!("No RSS items or Atom entries found in feed");
        return text;
    }

    for entry in entries {
        if let Some(title) = capture(&TITLE_RE, entry) {
            text.push(' ');
            text.push_str(&title);
        }
        if !titles_only {
            if let Some(summary) = capture(&SUMMARY_RE, entry) {
                text.push(' ');
                text.push_str(&summary);
            }
            if let Some(content) = capture(&CONTENT_RE, entry) {
                text.push(' ');
                text.push_str(&content);
            }
        }
    }

    text
}

/// Extract structured article records from a feed document. Absent fields
/// default to the empty string; `pub_date` is kept as the raw source text.
pub fn extract_articles(raw: &str, feed_name: &str) -> Vec<ExtractedArticle> {
    let doc = normalize(raw);
    let mut articles = Vec::new();

    for item in ITEM_RE.captures_iter(&doc).filter_map(|c| c.get(1)) {
        let item = item.as_str();
        articles.push(ExtractedArticle {
            title: capture(&TITLE_RE, item).unwrap_or_default(),
            link: capture(&LINK_RE, item).unwrap_or_default(),
            description: capture(&DESCRIPTION_RE, item).unwrap_or_default(),
            feed: feed_name.to_string(),
            pub_date: capture(&PUB_DATE_RE, item).unwrap_or_default(),
        });
    }
    if !articles.is_empty() {
        return articles;
    }

    for entry in ENTRY_RE.captures_iter(&doc).filter_map(|c| c.get(1)) {
        let entry = entry.as_str();
        // Atom carries the link in an href attribute, not element text.
        let link = ATOM_LINK_HREF_RE
            .captures(entry)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        articles.push(ExtractedArticle {
            title: capture(&TITLE_RE, entry).unwrap_or_default(),
            link,
            description: capture(&SUMMARY_RE, entry).unwrap_or_default(),
            feed: feed_name.to_string(),
            pub_date: capture(&PUBLISHED_RE, entry).unwrap_or_default(),
        });
    }

    articles
}
