//! crates/bookshelf_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One entry in an identity record's multi-valued email set.
#[derive(Debug, Clone)]
pub struct EmailAddress {
    pub id: String,
    pub address: String,
}

/// One entry in an identity record's multi-valued phone set.
#[derive(Debug, Clone)]
pub struct PhoneNumber {
    pub id: String,
    pub number: String,
}

/// The identity provider's view of a user. Read-only from this system's
/// perspective; never persisted verbatim.
///
/// The `primary_*_id` fields point at one entry of the corresponding set.
/// A dangling or absent reference means the contact method is unset.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub email_addresses: Vec<EmailAddress>,
    pub primary_email_id: Option<String>,
    pub phone_numbers: Vec<PhoneNumber>,
    pub primary_phone_id: Option<String>,
}

/// The durable local user record. The primary key is the provider's subject
/// identifier, reused verbatim, so there is exactly one row per external
/// identity. Created lazily on first authenticated request and never mutated
/// afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct LocalUser {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for a first-sync user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// An owned library resource, created only through the confirmation workflow.
/// `storage_key` is unique across all books.
#[derive(Debug, Clone, Serialize)]
pub struct Book {
    pub id: Uuid,
    pub owner_id: String,
    pub storage_key: String,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i32,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape for the confirmation workflow.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: Uuid,
    pub owner_id: String,
    pub storage_key: String,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i32,
}

/// Per-(book, user) reading position. Created atomically alongside its Book
/// with zero progress; mutated only by the progress tracker.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingProgress {
    pub book_id: Uuid,
    pub user_id: String,
    pub current_page: i32,
    pub percentage_complete: f64,
    pub updated_at: DateTime<Utc>,
}
