// Open Graph image probe for accepted signals. Best-effort only: every
// failure path returns None and the caller moves on.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const HEAD_LIMIT: usize = 50 * 1024;
const MAX_URL_LEN: usize = 2000;
const MAX_QUERY_LEN: usize = 200;
const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

static OG_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?(?:property|name)\s*=\s*["']og:image["'][^>]*?\scontent\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});
static OG_IMAGE_REV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?content\s*=\s*["']([^"']+)["'][^>]*?\s(?:property|name)\s*=\s*["']og:image["']"#)
        .expect("valid regex")
});
static TWITTER_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?(?:property|name)\s*=\s*["']twitter:image["'][^>]*?\scontent\s*=\s*["']([^"']+)["']"#)
        .expect("valid regex")
});

/// Fetch the page and pull out a usable preview image URL.
pub async fn fetch_og_image(url: &str) -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(BROWSER_UA)
        .build()
        .ok()?;

    let response = client.get(url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }

    // Stream at most HEAD_LIMIT bytes, stopping early at </head>.
    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut response = response;
    while let Ok(Some(chunk)) = response.chunk().await {
        buf.extend_from_slice(&chunk);
        if buf.len() >= HEAD_LIMIT {
            break;
        }
        let tail_start = buf.len().saturating_sub(chunk.len() + 7);
        if buf[tail_start..].windows(7).any(|w| w.eq_ignore_ascii_case(b"</head>")) {
            break;
        }
    }
    buf.truncate(HEAD_LIMIT);

    let html = String::from_utf8_lossy(&buf);
    let image = extract_og_image_url(&html)?;
    if !is_valid_image_url(&image) {
        debug!(url, image, "og image rejected by validation");
        return None;
    }
    Some(image)
}

/// og:image first (either attribute order), then twitter:image.
pub fn extract_og_image_url(html: &str) -> Option<String> {
    let head = match html.find("</head>") {
        Some(end) => &html[..end],
        None => html,
    };

    OG_IMAGE_RE
        .captures(head)
        .or_else(|| OG_IMAGE_REV_RE.captures(head))
        .or_else(|| TWITTER_IMAGE_RE.captures(head))
        .map(|c| c[1].trim().to_string())
        .filter(|u| !u.is_empty())
}

/// http(s), bounded length, no oversized query strings, and none of the
/// dynamic og-image endpoints that render per-request.
pub fn is_valid_image_url(image_url: &str) -> bool {
    if image_url.len() > MAX_URL_LEN {
        return false;
    }
    let Ok(parsed) = url::Url::parse(image_url) else {
        return false;
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }
    if parsed.query().map(|q| q.len() > MAX_QUERY_LEN).unwrap_or(false) {
        return false;
    }
    let path = parsed.path();
    if path.contains("/api/og") || path.contains("/og-image") {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_og_image_property_first() {
        let html = r#"<head>
<meta property="og:image" content="https://cdn.test/a.png"/>
<meta name="twitter:image" content="https://cdn.test/b.png"/>
</head>"#;
        assert_eq!(extract_og_image_url(html).as_deref(), Some("https://cdn.test/a.png"));
    }

    #[test]
    fn extracts_reversed_attribute_order() {
        let html = r#"<meta content="https://cdn.test/rev.png" property="og:image">"#;
        assert_eq!(extract_og_image_url(html).as_deref(), Some("https://cdn.test/rev.png"));
    }

    #[test]
    fn falls_back_to_twitter_image() {
        let html = r#"<head><meta name="twitter:image" content="https://cdn.test/t.jpg"></head>"#;
        assert_eq!(extract_og_image_url(html).as_deref(), Some("https://cdn.test/t.jpg"));
    }

    #[test]
    fn ignores_meta_after_head_close() {
        let html = r#"<head><title>x</title></head><body><meta property="og:image" content="https://cdn.test/late.png"></body>"#;
        assert_eq!(extract_og_image_url(html), None);
    }

    #[test]
    fn none_when_absent() {
        assert_eq!(extract_og_image_url("<head></head>"), None);
    }

    // --- validation tests ---

    #[test]
    fn valid_https_url_passes() {
        assert!(is_valid_image_url("https://cdn.test/image.png"));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(!is_valid_image_url("data:image/png;base64,AAAA"));
        assert!(!is_valid_image_url("ftp://cdn.test/a.png"));
    }

    #[test]
    fn rejects_overlong_urls() {
        let long = format!("https://cdn.test/{}", "a".repeat(2000));
        assert!(!is_valid_image_url(&long));
    }

    #[test]
    fn rejects_long_query_strings() {
        let url = format!("https://cdn.test/a.png?sig={}", "x".repeat(300));
        assert!(!is_valid_image_url(&url));
    }

    #[test]
    fn rejects_dynamic_og_endpoints() {
        assert!(!is_valid_image_url("https://site.test/api/og?title=x"));
        assert!(!is_valid_image_url("https://site.test/og-image/post-1"));
    }
}
