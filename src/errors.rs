//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Remote status codes that indicate a transient failure worth retrying.
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [408, 429, 502, 503, 504];

/// Application error enumeration covering all domain failure modes.
///
/// Cloneable so that a single failed execution can be delivered to every
/// caller waiting on the same cache fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Transport-level HTTP failure that is not a timeout.
    Http(String),
    /// Call rejected by a token bucket or by the remote service.
    RateLimited(String),
    /// Remote call did not complete in time.
    Timeout(String),
    /// Remote service answered with a non-success status code.
    Remote(u16, String),
    /// Job bridge ordering was violated (wrong head, or empty queue).
    Consistency(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Caller supplied malformed input.
    BadRequest(String),
    /// The awaited result slot was dropped before being resolved.
    Cancelled(String),
    /// Recipe execution failed for a domain reason.
    Recipe(String),
}

impl AppError {
    /// Whether the failure belongs to the transient set handled by retry.
    ///
    /// Timeouts, rate-limit rejections (proactive or remote-reported) and
    /// the designated remote status codes are retryable; everything else
    /// propagates immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Timeout(_) => true,
            Self::Remote(status, _) => RETRYABLE_STATUS_CODES.contains(status),
            _ => false,
        }
    }

    /// Short machine-friendly name of the variant, used in log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Db(_) => "db",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::RateLimited(_) => "rate_limited",
            Self::Timeout(_) => "timeout",
            Self::Remote(..) => "remote",
            Self::Consistency(_) => "consistency",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Cancelled(_) => "cancelled",
            Self::Recipe(_) => "recipe",
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Remote(status, msg) => write!(f, "remote {status}: {msg}"),
            Self::Consistency(msg) => write!(f, "consistency: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Cancelled(msg) => write!(f, "cancelled: {msg}"),
            Self::Recipe(msg) => write!(f, "recipe: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Remote(status.as_u16(), err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}
