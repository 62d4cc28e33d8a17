use std::collections::{HashMap, HashSet};

/// Count word frequencies in a blob of extracted feed text.
///
/// The text is lowercased and every character outside `[a-z\s]` becomes a
/// space, which uniformly strips punctuation, digits, and accented
/// characters. Tokens are dropped when they are stopwords, shorter than two
/// characters, or purely numeric (a second guard; the character filter
/// already removes digits).
///
/// The result is sorted by count descending; ties break lexicographically so
/// the order is stable, but callers should only rely on the descending head.
pub fn count_words(text: &str, stopwords: &HashSet<String>) -> Vec<(String, u32)> {
    if text.is_empty() {
        return Vec::new();
    }

    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() { c } else { ' ' })
        .collect();

    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in normalized.split_whitespace() {
        if token.len() < 2
            || stopwords.contains(token)
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, u32)> = counts
        .into_iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// Sum of all counts; recorded as `total_words` on the owning collection.
pub fn total_words(counts: &[(String, u32)]) -> i64 {
    counts.iter().map(|(_, c)| *c as i64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopset(words: &[&str]) -> HashSet<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn quick_brown_fox_counts() {
        let text = "the quick brown fox jumps over the lazy dog. The quick fox is quick.";
        let counts = count_words(text, &stopset(&["the", "is", "a"]));

        let map: HashMap<_, _> = counts.iter().cloned().collect();
        assert_eq!(map["quick"], 3);
        assert_eq!(map["fox"], 2);
        assert_eq!(map["brown"], 1);
        assert_eq!(map["jumps"], 1);
        assert_eq!(map["over"], 1);
        assert_eq!(map["lazy"], 1);
        assert_eq!(map["dog"], 1);
        assert_eq!(map.len(), 7);

        // Highest count first.
        assert_eq!(counts[0], ("quick".to_string(), 3));
    }

    #[test]
    fn every_token_is_clean() {
        let stopwords = stopset(&["and", "the"]);
        let text = "The 99 red balloons, AND 1 more: c'est déjà vu at No. 5!";
        for (word, count) in count_words(text, &stopwords) {
            assert!(word.len() >= 2, "short token {word:?}");
            assert!(!stopwords.contains(&word), "stopword {word:?}");
            assert!(
                word.chars().all(|c| c.is_ascii_lowercase()),
                "non-lowercase token {word:?}"
            );
            assert!(count >= 1);
        }
    }

    #[test]
    fn empty_text_is_empty_mapping() {
        assert!(count_words("", &stopset(&[])).is_empty());
        assert!(count_words("   \n\t ", &stopset(&[])).is_empty());
    }

    #[test]
    fn punctuation_and_digits_stripped() {
        let counts = count_words("re-elect 2024 election!", &stopset(&[]));
        let map: HashMap<_, _> = counts.into_iter().collect();
        assert_eq!(map.get("re").copied(), Some(1));
        assert_eq!(map.get("elect").copied(), Some(1));
        assert_eq!(map.get("election").copied(), Some(1));
        assert!(!map.contains_key("2024"));
    }

    #[test]
    fn total_words_sums_counts() {
        let counts = vec![("alpha".to_string(), 3), ("beta".to_string(), 2)];
        assert_eq!(total_words(&counts), 5);
    }
}
