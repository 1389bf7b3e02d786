use thiserror::Error;

/// Error type for remote repository operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Repository, ref or object not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication required or rejected
    #[error("authentication required: {0}")]
    AuthRequired(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// API rate limit exceeded
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Response did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidFormat(String),
}

/// Error type for the discovery/orchestration layer.
#[derive(Debug, Error)]
pub enum SourceError {
    /// User-actionable configuration problem, raised before any remote call
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Cooperative cancellation was requested between remote calls
    #[error("scan cancelled")]
    Cancelled,

    /// Content was requested for a path that is a directory
    #[error("path is a directory: {0}")]
    IsDirectory(String),

    /// Content was requested for a path that does not exist at the revision
    #[error("no such path: {0}")]
    NoSuchPath(String),

    /// A listing was requested below a path that is not a directory
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
