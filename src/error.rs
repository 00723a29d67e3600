use thiserror::Error;

/// Error type returned by external capabilities (stores and executors).
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Unknown principal types and database principals without a server login are
/// not errors: they are logged and the affected member or record is skipped.
#[derive(Debug, Error)]
pub enum Error {
    /// An external capability failed. The call made no progress and the
    /// previous resume token is still the correct resumption point.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Malformed resume token.
    #[error("invalid resume token: {0}")]
    InvalidToken(String),
    /// A resume token could not be serialized.
    #[error("failed to encode resume token: {0}")]
    TokenEncoding(#[from] serde_json::Error),
    /// Invalid identifier or name input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Resource of the wrong type for the requested operation.
    #[error("invalid resource: {0}")]
    InvalidResource(String),
    /// Malformed entitlement id or a permission code outside the vocabulary.
    #[error("invalid entitlement: {0}")]
    InvalidEntitlement(String),
    /// A provisioning lookup found nothing.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// The traversal tracks more distinct roles than allowed.
    #[error("role traversal from {root} exceeds {max_roles} distinct roles")]
    TraversalLimitExceeded { root: String, max_roles: usize },
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
