//! crates/bookshelf_core/src/error.rs
//!
//! The error taxonomy surfaced by every core workflow. Each variant is a
//! stable, distinct condition the request boundary can map onto an HTTP
//! status without inspecting message text.

/// The primary error type for the core workflows.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No `Authorization` header was presented.
    #[error("missing credential")]
    MissingCredential,

    /// The header was present but not of the shape `Bearer <token>`.
    #[error("malformed credential")]
    MalformedCredential,

    /// The identity provider rejected the token.
    #[error("invalid credential")]
    InvalidCredential,

    /// The identity provider could not be reached, or the secondary identity
    /// lookup failed after a successful verification.
    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The identity lacks an attribute required for account creation
    /// (currently: a resolvable primary email).
    #[error("identity is missing a required attribute: {0}")]
    MissingRequiredAttribute(&'static str),

    /// Two first-sync inserts raced and the re-fetch after losing also
    /// missed. A store anomaly; callers may retry the whole sync.
    #[error("user already exists")]
    DuplicateUser,

    /// A persistence operation failed for a reason other than no-rows or a
    /// unique-constraint conflict. Never swallowed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The storage key named in a confirmation request does not exist in the
    /// storage backend.
    #[error("no stored object at key {0}")]
    ObjectNotFound(String),

    /// A book for this storage key is already registered. The expected
    /// outcome of a retried confirmation call.
    #[error("resource already registered")]
    DuplicateResource,

    /// The requested book does not exist.
    #[error("not found")]
    NotFound,

    /// The requester does not own the resource.
    #[error("forbidden")]
    Forbidden,

    /// The auth pipeline did not run before a handler that requires it.
    /// A programming error, reported loudly and opaquely.
    #[error("request context corrupted: {0}")]
    ContextCorruption(&'static str),

    /// URL signing failed.
    #[error("signing failure: {0}")]
    Signing(String),

    /// The request body or a path parameter failed validation.
    #[error("{0}")]
    Validation(String),

    /// An external call outlived the request deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
