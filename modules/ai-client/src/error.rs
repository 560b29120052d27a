use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    /// HTTP 429. `retry_after_secs` carries the server-advised wait when the
    /// Retry-After header was present and parseable.
    #[error("rate limited by provider")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned no content")]
    Empty,
}
