use axum::http::{header, HeaderMap};

/// Byte comparison without data-dependent early exit.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Accept the ingest secret (or the scheduler secret) as a bearer token, via
/// the `x-cron-secret` header, or via the legacy `?secret=` query param.
pub fn check_ingest_auth(
    headers: &HeaderMap,
    query_secret: Option<&str>,
    ingest_secret: &str,
    cron_secret: &str,
) -> bool {
    let matches_either = |candidate: &str| {
        (!ingest_secret.is_empty() && constant_time_eq(candidate.as_bytes(), ingest_secret.as_bytes()))
            || (!cron_secret.is_empty()
                && constant_time_eq(candidate.as_bytes(), cron_secret.as_bytes()))
    };

    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            if matches_either(token.trim()) {
                return true;
            }
        }
    }

    if let Some(token) = headers.get("x-cron-secret").and_then(|v| v.to_str().ok()) {
        if matches_either(token.trim()) {
            return true;
        }
    }

    if let Some(token) = query_secret {
        if matches_either(token.trim()) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        h
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn bearer_token_accepted() {
        let h = headers(&[("authorization", "Bearer s3cret")]);
        assert!(check_ingest_auth(&h, None, "s3cret", ""));
    }

    #[test]
    fn scheduler_secret_accepted_as_bearer() {
        let h = headers(&[("authorization", "Bearer cron-s3cret")]);
        assert!(check_ingest_auth(&h, None, "s3cret", "cron-s3cret"));
    }

    #[test]
    fn cron_header_accepted() {
        let h = headers(&[("x-cron-secret", "s3cret")]);
        assert!(check_ingest_auth(&h, None, "s3cret", ""));
    }

    #[test]
    fn legacy_query_param_accepted() {
        let h = HeaderMap::new();
        assert!(check_ingest_auth(&h, Some("s3cret"), "s3cret", ""));
    }

    #[test]
    fn wrong_or_missing_token_denied() {
        let h = headers(&[("authorization", "Bearer nope")]);
        assert!(!check_ingest_auth(&h, None, "s3cret", ""));
        assert!(!check_ingest_auth(&HeaderMap::new(), None, "s3cret", ""));
    }

    #[test]
    fn empty_configured_secret_never_matches() {
        let h = headers(&[("authorization", "Bearer ")]);
        assert!(!check_ingest_auth(&h, Some(""), "", ""));
    }
}
