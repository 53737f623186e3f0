//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `UserStore` and `LibraryStore` ports from the `core`
//! crate. It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bookshelf_core::domain::{Book, LocalUser, NewBook, NewUser, ReadingProgress};
use bookshelf_core::ports::{LibraryStore, PortError, PortResult, UserStore};
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the persistence ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: String,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> LocalUser {
        LocalUser {
            id: self.id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            added_at: self.added_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    owner_id: String,
    storage_key: String,
    title: String,
    author: Option<String>,
    total_pages: i32,
    added_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            owner_id: self.owner_id,
            storage_key: self.storage_key,
            title: self.title,
            author: self.author,
            total_pages: self.total_pages,
            added_at: self.added_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    book_id: Uuid,
    user_id: String,
    current_page: i32,
    percentage_complete: f64,
    updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    fn to_domain(self) -> ReadingProgress {
        ReadingProgress {
            book_id: self.book_id,
            user_id: self.user_id,
            current_page: self.current_page,
            percentage_complete: self.percentage_complete,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn map_err(context: &str, e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(context.to_string()),
        sqlx::Error::PoolTimedOut => PortError::Timeout(context.to_string()),
        sqlx::Error::Database(db) if matches!(db.kind(), ErrorKind::UniqueViolation) => {
            PortError::UniqueViolation(context.to_string())
        }
        _ => PortError::Unavailable(format!("{context}: {e}")),
    }
}

//=========================================================================================
// `UserStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn get_user(&self, id: &str) -> PortResult<LocalUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, username, first_name, last_name, phone, added_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_err("user lookup", e))?;

        Ok(record.to_domain())
    }

    async fn create_user(&self, user: NewUser) -> PortResult<LocalUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, username, first_name, last_name, phone) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, email, username, first_name, last_name, phone, added_at, updated_at",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_err("user insert", e))?;

        Ok(record.to_domain())
    }
}

//=========================================================================================
// `LibraryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl LibraryStore for DbAdapter {
    /// The Book insert and the ReadingProgress insert run inside one
    /// transaction; a failure of either, or of the commit, rolls the whole
    /// pair back (rollback happens on drop of the open transaction).
    async fn create_book_with_progress(&self, book: NewBook) -> PortResult<Book> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_err("begin confirmation", e))?;

        let record = sqlx::query_as::<_, BookRecord>(
            "INSERT INTO books (id, owner_id, storage_key, title, author, total_pages) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, owner_id, storage_key, title, author, total_pages, added_at, updated_at",
        )
        .bind(book.id)
        .bind(&book.owner_id)
        .bind(&book.storage_key)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.total_pages)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_err("book insert", e))?;

        // Dependent row: references the freshly generated book id.
        sqlx::query(
            "INSERT INTO reading_progress (book_id, user_id, current_page, percentage_complete) \
             VALUES ($1, $2, 0, 0)",
        )
        .bind(record.id)
        .bind(&book.owner_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_err("reading progress insert", e))?;

        tx.commit()
            .await
            .map_err(|e| map_err("commit confirmation", e))?;

        Ok(record.to_domain())
    }

    async fn get_book(&self, id: Uuid) -> PortResult<Book> {
        let record = sqlx::query_as::<_, BookRecord>(
            "SELECT id, owner_id, storage_key, title, author, total_pages, added_at, updated_at \
             FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_err("book lookup", e))?;

        Ok(record.to_domain())
    }

    async fn books_by_owner(&self, owner_id: &str) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT id, owner_id, storage_key, title, author, total_pages, added_at, updated_at \
             FROM books WHERE owner_id = $1 ORDER BY added_at",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_err("library listing", e))?;

        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn update_progress(
        &self,
        book_id: Uuid,
        user_id: &str,
        current_page: i32,
        percentage_complete: f64,
    ) -> PortResult<ReadingProgress> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "UPDATE reading_progress \
             SET current_page = $3, percentage_complete = $4, updated_at = now() \
             WHERE book_id = $1 AND user_id = $2 \
             RETURNING book_id, user_id, current_page, percentage_complete, updated_at",
        )
        .bind(book_id)
        .bind(user_id)
        .bind(current_page)
        .bind(percentage_complete)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_err("progress update", e))?;

        Ok(record.to_domain())
    }
}
