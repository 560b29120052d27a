use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Canonicalize a URL for identity purposes: lowercase scheme + host + path,
/// strip a trailing slash, drop query and fragment.
pub fn normalize_url(raw: &str) -> String {
    match url::Url::parse(raw.trim()) {
        Ok(u) => {
            let host = u.host_str().unwrap_or("");
            let path = u.path().trim_end_matches('/');
            format!("{}://{}{}", u.scheme(), host, path).to_lowercase()
        }
        Err(_) => raw.trim().trim_end_matches('/').to_lowercase(),
    }
}

/// Extract the registrable-ish domain from a URL: host minus a leading "www.".
/// Falls back to a conservative split when URL parsing fails.
pub fn extract_domain(raw: &str) -> String {
    let host = match url::Url::parse(raw.trim()) {
        Ok(u) => u.host_str().unwrap_or("").to_string(),
        Err(_) => raw
            .split("://")
            .nth(1)
            .unwrap_or(raw)
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("")
            .to_string(),
    };
    host.to_lowercase()
        .trim_start_matches("www.")
        .to_string()
}

/// Identity hash for a fetched item.
///
/// When the feed supplied an external id the hash is over
/// `normalize(url)|externalId|`; otherwise over
/// `normalize(url)|lowercased-title|date-bucket-or-"unknown"`. Refetching the
/// same item always lands on the same hash, which is what the unique index
/// on raw signals relies on.
pub fn content_hash(
    url: &str,
    external_id: Option<&str>,
    title: Option<&str>,
    published_at: Option<DateTime<Utc>>,
) -> String {
    let basis = match external_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => format!("{}|{}|", normalize_url(url), id.trim()),
        None => {
            let title = title.unwrap_or("").trim().to_lowercase();
            let bucket = published_at
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            format!("{}|{}|{}", normalize_url(url), title, bucket)
        }
    };
    hex::encode(Sha256::digest(basis.as_bytes()))
}

/// Map a cluster fingerprint to a Postgres advisory-lock key.
///
/// First 60 bits of SHA-256(fingerprint) interpreted as a non-negative i64,
/// so the value always fits the signed 64-bit key `pg_advisory_xact_lock`
/// expects.
pub fn fingerprint_lock_key(fingerprint: &str) -> i64 {
    let digest = Sha256::digest(fingerprint.as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(first) >> 4) as i64
}

/// Truncate to at most `max` characters, appending an ellipsis inside the
/// limit when anything was cut. Returns the input untouched when it fits.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = s.chars().take(keep).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // --- normalize_url tests ---

    #[test]
    fn normalize_strips_query_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("HTTPS://Example.com/News/Item/?utm_source=x#top"),
            "https://example.com/news/item"
        );
    }

    #[test]
    fn normalize_bare_string_fallback() {
        assert_eq!(normalize_url("  Not a URL/ "), "not a url");
    }

    // --- extract_domain tests ---

    #[test]
    fn domain_strips_www() {
        assert_eq!(extract_domain("https://www.theverge.com/ai"), "theverge.com");
        assert_eq!(extract_domain("https://blog.replika.com/post"), "blog.replika.com");
    }

    #[test]
    fn domain_fallback_without_scheme() {
        assert_eq!(extract_domain("www.example.com/page?q=1"), "example.com");
    }

    // --- content_hash tests ---

    #[test]
    fn hash_prefers_external_id() {
        let a = content_hash("https://ex.com/a", Some("guid-1"), Some("Title A"), None);
        let b = content_hash("https://ex.com/a", Some("guid-1"), Some("Totally Different"), None);
        assert_eq!(a, b, "title must not matter when the feed gave an id");
    }

    #[test]
    fn hash_falls_back_to_title_and_date_bucket() {
        let day = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let later_same_day = Utc.with_ymd_and_hms(2026, 3, 14, 22, 0, 0).unwrap();
        let a = content_hash("https://ex.com/a", None, Some("Replika Update"), Some(day));
        let b = content_hash("https://ex.com/a", None, Some("replika update"), Some(later_same_day));
        assert_eq!(a, b, "same day + case-folded title converge");

        let other_day = Utc.with_ymd_and_hms(2026, 3, 15, 9, 0, 0).unwrap();
        let c = content_hash("https://ex.com/a", None, Some("Replika Update"), Some(other_day));
        assert_ne!(a, c);
    }

    #[test]
    fn hash_unknown_bucket_when_no_date() {
        let a = content_hash("https://ex.com/a", None, Some("T"), None);
        let b = content_hash("https://ex.com/a", None, Some("T"), None);
        assert_eq!(a, b);
    }

    #[test]
    fn hash_blank_external_id_is_ignored() {
        let a = content_hash("https://ex.com/a", Some("  "), Some("T"), None);
        let b = content_hash("https://ex.com/a", None, Some("T"), None);
        assert_eq!(a, b);
    }

    // --- fingerprint_lock_key tests ---

    #[test]
    fn lock_key_is_deterministic_and_non_negative() {
        let k1 = fingerprint_lock_key("replika|2026-03-14|update,voice,call");
        let k2 = fingerprint_lock_key("replika|2026-03-14|update,voice,call");
        assert_eq!(k1, k2);
        assert!(k1 >= 0);
        assert!(k1 < (1i64 << 60));
    }

    #[test]
    fn lock_key_differs_across_fingerprints() {
        assert_ne!(
            fingerprint_lock_key("a|2026-01-01|x"),
            fingerprint_lock_key("b|2026-01-01|x")
        );
    }

    // --- truncate tests ---

    #[test]
    fn truncate_fits_untouched() {
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
        assert_eq!(truncate_with_ellipsis("exact", 5), "exact");
    }

    #[test]
    fn truncate_appends_ellipsis_within_limit() {
        let out = truncate_with_ellipsis("abcdefgh", 5);
        assert_eq!(out, "abcd…");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let out = truncate_with_ellipsis("héllo wörld", 6);
        assert_eq!(out.chars().count(), 6);
        assert!(out.ends_with('…'));
    }
}
