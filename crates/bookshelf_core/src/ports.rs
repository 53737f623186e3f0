//! crates/bookshelf_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete identity provider, object store,
//! CDN signer and database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Book, ExternalIdentity, LocalUser, NewBook, NewUser, ReadingProgress};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Failures an adapter can express. The core maps these onto the richer
/// `CoreError` taxonomy at the call site, where it knows which operation was
/// in flight.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The no-rows / no-object condition, distinguished from transport
    /// failures so callers can branch on it.
    #[error("not found: {0}")]
    NotFound(String),
    /// A unique-constraint conflict reported by the store.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    /// The identity provider rejected the credential (expired, malformed,
    /// revoked). A point-in-time fact; never retried.
    #[error("credential rejected by identity provider")]
    CredentialRejected,
    /// A cryptographic signing operation failed.
    #[error("signing failed: {0}")]
    Signing(String),
    /// The call did not complete within the request deadline.
    #[error("deadline exceeded: {0}")]
    Timeout(String),
    /// Connectivity or protocol failure talking to the collaborator.
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The external identity provider, consumed as two operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verifies a bearer token and returns the provider's subject identifier.
    async fn verify_token(&self, token: &str) -> PortResult<String>;

    /// Resolves a subject identifier to the full identity record.
    async fn fetch_identity(&self, subject: &str) -> PortResult<ExternalIdentity>;
}

/// Durable user records keyed by the provider's subject identifier.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Point lookup by external ID. `NotFound` for the no-rows condition.
    async fn get_user(&self, id: &str) -> PortResult<LocalUser>;

    /// Inserts a first-sync row. `UniqueViolation` when the subject already
    /// has one (the race loser's outcome).
    async fn create_user(&self, user: NewUser) -> PortResult<LocalUser>;
}

/// Books and their reading-progress rows.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Inserts a Book and its zero-progress ReadingProgress row inside one
    /// transaction: if either insert or the commit fails, neither row may
    /// persist. `UniqueViolation` reports a duplicate storage key.
    async fn create_book_with_progress(&self, book: NewBook) -> PortResult<Book>;

    async fn get_book(&self, id: Uuid) -> PortResult<Book>;

    async fn books_by_owner(&self, owner_id: &str) -> PortResult<Vec<Book>>;

    /// Updates the row keyed by (book_id, user_id) and returns it.
    async fn update_progress(
        &self,
        book_id: Uuid,
        user_id: &str,
        current_page: i32,
        percentage_complete: f64,
    ) -> PortResult<ReadingProgress>;
}

/// The object-storage backend behind the upload path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Existence probe for a key. Not a content or integrity check.
    async fn exists(&self, key: &str) -> PortResult<bool>;

    /// Issues a time-limited signed PUT URL for a key.
    async fn presign_upload(&self, key: &str, expires_in: Duration) -> PortResult<String>;
}

/// Signs read URLs against the content-delivery origin. Pure: a function of
/// the key, the expiry instant and the signer's fixed key material.
pub trait ReadUrlSigner: Send + Sync {
    fn signed_read_url(&self, key: &str, expires_at: DateTime<Utc>) -> PortResult<String>;
}
