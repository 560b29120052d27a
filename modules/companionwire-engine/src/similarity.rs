//! TF-IDF cosine similarity for phase-2 cluster matching. IDF is computed
//! per call over the candidate set plus the query; there is no global IDF
//! state to drift.

use std::collections::{HashMap, HashSet};

use companionwire_common::text::{tokenize, top_keywords};

/// IDF applied to terms outside the per-call corpus.
fn fallback_idf() -> f64 {
    (10.0f64).ln()
}

/// Term frequency normalized by the document's max count (0..1).
pub fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in tokens {
        *counts.entry(t).or_insert(0) += 1;
    }
    let max = counts.values().copied().max().unwrap_or(1) as f64;
    counts
        .into_iter()
        .map(|(t, c)| (t.to_string(), c as f64 / max))
        .collect()
}

/// Inverse document frequency over a document set: `ln(N / df) + 1`.
pub fn inverse_document_frequencies(docs: &[Vec<String>]) -> HashMap<String, f64> {
    let n = docs.len() as f64;
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in docs {
        let unique: HashSet<&str> = doc.iter().map(|t| t.as_str()).collect();
        for t in unique {
            *df.entry(t).or_insert(0) += 1;
        }
    }
    df.into_iter()
        .map(|(t, f)| (t.to_string(), (n / f as f64).ln() + 1.0))
        .collect()
}

/// TF×IDF vector for one document. Terms missing from the IDF table use the
/// fallback weight.
pub fn vectorize(tokens: &[String], idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    term_frequencies(tokens)
        .into_iter()
        .map(|(t, tf)| {
            let w = idf.get(&t).copied().unwrap_or_else(fallback_idf);
            (t, tf * w)
        })
        .collect()
}

/// Standard cosine; 0 when either vector has zero norm.
pub fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(t, va)| b.get(t).map(|vb| va * vb))
        .sum();
    let norm_a: f64 = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Shared-platform bonus added on top of cosine: 0.2 per shared platform,
/// capped at 0.4.
pub fn platform_bonus(a: &[String], b: &[String]) -> f64 {
    let set: HashSet<&str> = a.iter().map(|s| s.as_str()).collect();
    let shared = b.iter().filter(|s| set.contains(s.as_str())).count();
    (0.2 * shared as f64).min(0.4)
}

/// Cosine over the query and every candidate, with IDF built from the whole
/// group. Returns one score per candidate, candidate order preserved.
pub fn score_candidates(query_tokens: &[String], candidate_tokens: &[Vec<String>]) -> Vec<f64> {
    let mut docs: Vec<Vec<String>> = Vec::with_capacity(candidate_tokens.len() + 1);
    docs.push(query_tokens.to_vec());
    docs.extend(candidate_tokens.iter().cloned());
    let idf = inverse_document_frequencies(&docs);

    let query_vec = vectorize(query_tokens, &idf);
    candidate_tokens
        .iter()
        .map(|tokens| cosine(&query_vec, &vectorize(tokens, &idf)))
        .collect()
}

/// The compact text a cluster is indexed under: headline plus up to the top
/// 10 TF tokens of the summary.
pub fn build_search_text(headline: &str, summary: &str) -> String {
    let mut parts = vec![headline.trim().to_string()];
    let keywords = top_keywords(summary, 10);
    if !keywords.is_empty() {
        parts.push(keywords.join(" "));
    }
    parts.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        tokenize(text)
    }

    // --- term frequency tests ---

    #[test]
    fn tf_normalized_by_max_count() {
        let tf = term_frequencies(&tokens("voice voice voice chat"));
        assert_eq!(tf["voice"], 1.0);
        assert!((tf["chat"] - 1.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn tf_empty_document() {
        assert!(term_frequencies(&[]).is_empty());
    }

    // --- idf tests ---

    #[test]
    fn idf_rarer_terms_weigh_more() {
        let docs = vec![
            tokens("replika voice update"),
            tokens("replika pricing update"),
            tokens("replika outage"),
        ];
        let idf = inverse_document_frequencies(&docs);
        // "replika" in all 3 docs: ln(3/3)+1 = 1.0
        assert!((idf["replika"] - 1.0).abs() < 1e-10);
        // "voice" in 1 doc: ln(3)+1
        assert!((idf["voice"] - (3.0f64.ln() + 1.0)).abs() < 1e-10);
        assert!(idf["voice"] > idf["update"]);
    }

    #[test]
    fn unknown_term_uses_fallback_idf() {
        let idf = HashMap::new();
        let vec = vectorize(&tokens("mystery"), &idf);
        assert!((vec["mystery"] - 10.0f64.ln()).abs() < 1e-10);
    }

    // --- cosine tests ---

    #[test]
    fn cosine_identical_documents_is_one() {
        let docs = vec![tokens("replika voice calls"), tokens("replika voice calls")];
        let idf = inverse_document_frequencies(&docs);
        let a = vectorize(&docs[0], &idf);
        let b = vectorize(&docs[1], &idf);
        assert!((cosine(&a, &b) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn cosine_disjoint_documents_is_zero() {
        let a = vectorize(&tokens("replika voice"), &HashMap::new());
        let b = vectorize(&tokens("regulator fines"), &HashMap::new());
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_norm_is_zero() {
        let empty = HashMap::new();
        let full = vectorize(&tokens("anything here"), &HashMap::new());
        assert_eq!(cosine(&empty, &full), 0.0);
        assert_eq!(cosine(&empty, &empty), 0.0);
    }

    // --- platform bonus tests ---

    #[test]
    fn bonus_scales_with_shared_platforms() {
        let a = vec!["replika".to_string(), "nomi".to_string()];
        assert_eq!(platform_bonus(&a, &["replika".to_string()]), 0.2);
        assert_eq!(platform_bonus(&a, &a), 0.4);
        assert_eq!(platform_bonus(&a, &["chai".to_string()]), 0.0);
    }

    #[test]
    fn bonus_caps_at_point_four() {
        let many: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(platform_bonus(&many, &many), 0.4);
    }

    // --- score_candidates tests ---

    #[test]
    fn best_candidate_scores_highest() {
        let query = tokens("replika launches voice calls subscribers");
        let candidates = vec![
            tokens("replika voice calls rollout subscribers"),
            tokens("regulator fines character platform minors"),
        ];
        let scores = score_candidates(&query, &candidates);
        assert_eq!(scores.len(), 2);
        assert!(scores[0] > scores[1]);
        assert!(scores[0] > 0.4);
    }

    #[test]
    fn no_candidates_no_scores() {
        assert!(score_candidates(&tokens("query"), &[]).is_empty());
    }

    // --- search text tests ---

    #[test]
    fn search_text_is_headline_plus_summary_keywords() {
        let text = build_search_text(
            "Replika adds voice calls",
            "Voice calls arrive for paying subscribers. Calls use a new speech model.",
        );
        assert!(text.starts_with("Replika adds voice calls"));
        assert!(text.contains("calls"));
        assert!(text.contains("voice"));
    }

    #[test]
    fn search_text_keyword_count_bounded() {
        let summary = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda omicron";
        let text = build_search_text("Headline", summary);
        let token_count = text.split_whitespace().count();
        assert!(token_count <= 11, "headline word + 10 keywords, got {token_count}");
    }

    #[test]
    fn search_text_empty_summary() {
        assert_eq!(build_search_text("Just Headline", ""), "Just Headline");
    }
}
