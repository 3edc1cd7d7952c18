//! Error types shared across the crate.
//!
//! Subsystem errors (`DbError`, `CacheError`, `SearchError`) are wrapped
//! transparently by the top-level [`Error`]. Callers that need to decide on
//! retries or HTTP status codes go through [`Error::kind`].

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used for retry decisions and HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source row (or cache key) does not exist.
    NotFound,
    /// Malformed input, unknown configuration, or failed validation.
    InvalidRequest,
    /// A cache, index, datastore or publisher failure. Retryable.
    Transport,
    /// A value failed to encode or decode. Not retryable without a code change.
    Serialization,
    /// The operation was cancelled or ran past its deadline.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("event queue rejected {event_type}: {reason}")]
    Publish { event_type: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation cancelled or deadline exceeded")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidRequest(_) | Error::Config(_) => ErrorKind::InvalidRequest,
            Error::Db(DbError::Sqlx(sqlx::Error::RowNotFound)) => ErrorKind::NotFound,
            Error::Cache(CacheError::Encoding(_)) => ErrorKind::Serialization,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Db(_)
            | Error::Cache(_)
            | Error::Search(_)
            | Error::Publish { .. }
            | Error::Other(_) => ErrorKind::Transport,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether another attempt may succeed without a code or config change.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Cancelled)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Cancelled
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

/// Source-of-truth datastore failures.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for Error {
    fn from(error: sqlx::Error) -> Self {
        Error::Db(DbError::Sqlx(error))
    }
}

/// Cache provider failures.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis {operation} timed out")]
    Timeout { operation: &'static str },

    #[error("cache value could not be encoded: {0}")]
    Encoding(serde_json::Error),
}

impl From<redis::RedisError> for Error {
    fn from(error: redis::RedisError) -> Self {
        Error::Cache(CacheError::Redis(error))
    }
}

/// Search index provider failures.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("lancedb error: {0}")]
    LanceDb(String),

    #[error("search index {index} is unavailable: {reason}")]
    Unavailable { index: String, reason: String },
}
