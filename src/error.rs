use thiserror::Error;

/// Error type produced by identity collaborators (group management, group
/// registry, authentication).
pub type UpstreamError = Box<dyn std::error::Error + Send + Sync>;

/// Error type produced by decision cache implementations.
pub type CacheError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid required configuration, detected at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A downstream collaborator was unreachable or returned malformed data.
    /// No decision is cached when this is returned.
    #[error("upstream service error: {0}")]
    Upstream(#[source] UpstreamError),
    /// The decision cache failed or reported an undefined state. This is a
    /// programming-fatal condition and is never folded into allow or deny.
    #[error("decision cache inconsistency: {0}")]
    CacheInconsistency(#[source] CacheError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid action input.
    #[error("invalid action: {0}")]
    InvalidAction(String),
    /// Invalid credential input.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl From<UpstreamError> for Error {
    fn from(error: UpstreamError) -> Self {
        Self::Upstream(error)
    }
}
