//! HTML → plain text for feed entry bodies. A regex pipeline, not a real
//! parser: good enough for the summary/content fields syndication feeds
//! carry, and it never panics on malformed markup.

use std::sync::LazyLock;

use regex::Regex;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip tags, scripts, styles, and comments; unescape the common entities;
/// collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT_RE.replace_all(html, " ");
    let text = STYLE_RE.replace_all(&text, " ");
    let text = COMMENT_RE.replace_all(&text, " ");
    let text = TAG_RE.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    WS_RE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn strips_scripts_and_styles() {
        let html = r#"<div>Visible<script>var x = "<p>hidden</p>";</script><style>.a { color: red }</style></div>"#;
        assert_eq!(strip_html(html), "Visible");
    }

    #[test]
    fn strips_comments() {
        assert_eq!(strip_html("before<!-- secret <b>note</b> -->after"), "before after");
    }

    #[test]
    fn unescapes_entities() {
        assert_eq!(strip_html("Tom &amp; Jerry &lt;3"), "Tom & Jerry <3");
        assert_eq!(strip_html("it&#39;s &quot;fine&quot;"), "it's \"fine\"");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(strip_html("<p>a</p>\n\n  <p>b</p>"), "a b");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_html("already plain"), "already plain");
    }
}
