//! Tokenization and keyword extraction shared by the clusterer and the
//! TF-IDF similarity pass. Deterministic and locale-free: ASCII-ish
//! lowercasing, a fixed English stopword list, no stemming.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;

static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was",
        "one", "our", "out", "day", "get", "has", "him", "his", "how", "man", "new", "now",
        "old", "see", "two", "way", "who", "its", "did", "yes", "your", "from", "they",
        "been", "have", "much", "some", "them", "were", "will", "with", "this", "that",
        "what", "when", "where", "which", "while", "would", "there", "their", "these",
        "those", "then", "than", "also", "into", "over", "under", "after", "before",
        "about", "above", "below", "between", "both", "each", "more", "most", "other",
        "such", "only", "same", "very", "just", "because", "through", "during", "until",
        "again", "once", "here", "why", "any", "does", "doing", "down", "few", "further",
        "itself", "off", "own", "should", "too", "against", "being", "could", "ours",
        "says", "said", "made", "make", "like", "back", "even", "still", "well",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, replace non-alphanumerics with spaces, split, drop stopwords
/// and tokens of length <= 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.len() > 2 && !STOPWORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Top-N tokens by frequency. Ties break by first appearance in the text,
/// which keeps the result stable for identical inputs.
pub fn top_keywords(text: &str, n: usize) -> Vec<String> {
    let tokens = tokenize(text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (i, t) in tokens.iter().enumerate() {
        *counts.entry(t).or_insert(0) += 1;
        first_seen.entry(t).or_insert(i);
    }
    let mut ranked: Vec<&str> = counts.keys().copied().collect();
    ranked.sort_by(|a, b| {
        counts[b]
            .cmp(&counts[a])
            .then(first_seen[a].cmp(&first_seen[b]))
    });
    ranked.into_iter().take(n).map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The AI companion app is now live for all users");
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"for".to_string()));
        assert!(!tokens.contains(&"is".to_string()), "len <= 2 dropped");
        assert!(tokens.contains(&"companion".to_string()));
        assert!(tokens.contains(&"live".to_string()));
    }

    #[test]
    fn tokenize_replaces_punctuation() {
        assert_eq!(tokenize("voice-calls,launched!"), vec!["voice", "calls", "launched"]);
    }

    #[test]
    fn tokenize_is_deterministic() {
        let text = "Replika launches voice calls; voice mode ships next week";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn keywords_ranked_by_frequency() {
        let kws = top_keywords("voice voice voice chat chat update", 2);
        assert_eq!(kws, vec!["voice", "chat"]);
    }

    #[test]
    fn keyword_ties_break_by_first_appearance() {
        let kws = top_keywords("alpha beta gamma alpha beta gamma", 3);
        assert_eq!(kws, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn keywords_empty_text() {
        assert!(top_keywords("", 5).is_empty());
        assert!(top_keywords("a an it", 5).is_empty());
    }
}
