/// Truncate a string to at most `max_bytes` bytes at a character boundary.
pub fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}

/// Strip markdown code blocks from a response.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Extract the first balanced `{...}` object from a response that may wrap
/// JSON in prose. Tracks string literals and escapes so braces inside string
/// values don't throw the depth count off. Returns the whole trimmed input
/// when no balanced object is found.
pub fn extract_json_object(response: &str) -> &str {
    let cleaned = strip_code_blocks(response);
    let bytes = cleaned.as_bytes();

    let Some(start) = cleaned.find('{') else {
        return cleaned;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return &cleaned[start..=i];
                }
            }
            _ => {}
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_char_boundary() {
        let text = "Hello 世界";
        let truncated = truncate_to_char_boundary(text, 8);
        assert!(truncated.len() <= 8);
        assert!(text.starts_with(truncated));
    }

    #[test]
    fn test_truncate_within_bounds() {
        let text = "Hello";
        assert_eq!(truncate_to_char_boundary(text, 100), "Hello");
    }

    #[test]
    fn test_strip_code_blocks() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }

    #[test]
    fn extract_plain_object_unchanged() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn extract_object_from_prose() {
        let resp = r#"Here is the result you asked for: {"summary": "x", "confidence": 0.8} Hope that helps!"#;
        assert_eq!(extract_json_object(resp), r#"{"summary": "x", "confidence": 0.8}"#);
    }

    #[test]
    fn extract_handles_nested_objects() {
        let resp = r#"{"entities": {"platforms": ["replika"]}, "confidence": 1.0}"#;
        assert_eq!(extract_json_object(resp), resp);
    }

    #[test]
    fn extract_ignores_braces_inside_strings() {
        let resp = r#"{"summary": "uses {curly} braces and a quote \" here"}"#;
        assert_eq!(extract_json_object(resp), resp);
    }

    #[test]
    fn extract_without_object_returns_input() {
        assert_eq!(extract_json_object("no json here"), "no json here");
    }
}
