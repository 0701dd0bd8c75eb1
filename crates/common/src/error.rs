use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Upstream fetch failed or returned nothing usable. The poll loop skips
    /// the cycle and retries after the error backoff.
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input rejected at construction (unordered timestamps,
    /// zero lookback, non-positive interval).
    #[error("Contract violation: {0}")]
    Contract(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
