//! crates/bookshelf_core/src/library.rs
//!
//! The library workflows: per-user upload-key namespacing, signed-URL
//! issuance, the transactional upload-confirmation workflow, and the
//! reading-progress tracker.

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{Book, LocalUser, NewBook, ReadingProgress};
use crate::error::{CoreError, CoreResult};
use crate::ports::{LibraryStore, ObjectStore, PortError, ReadUrlSigner};

/// A confirmation request, submitted after the client has completed the
/// out-of-band upload to a previously issued upload URL.
#[derive(Debug, Clone)]
pub struct ConfirmUpload {
    pub title: String,
    pub author: Option<String>,
    pub storage_key: String,
    pub total_pages: i32,
}

/// Builds the object key for a user upload: `<ownerID>/<clientSuppliedName>`.
/// The owner prefix namespaces every user's uploads.
pub fn upload_key(owner: &LocalUser, name: &str) -> String {
    format!("{}/{}", owner.id, name)
}

/// Issues a time-limited signed PUT URL for an upload key. Stateless; the
/// expiry window is a policy value chosen by the caller's configuration and
/// deliberately short, forcing clients to request immediately before use.
pub async fn issue_upload_url(
    objects: &dyn ObjectStore,
    key: &str,
    expires_in: Duration,
) -> CoreResult<String> {
    objects
        .presign_upload(key, expires_in)
        .await
        .map_err(signing)
}

/// Issues a signed GET URL against the content-delivery origin, valid until
/// `now + window`. Reads go through the delivery layer, never the storage
/// backend directly.
pub fn issue_read_url(
    signer: &dyn ReadUrlSigner,
    key: &str,
    expires_at: DateTime<Utc>,
) -> CoreResult<String> {
    signer.signed_read_url(key, expires_at).map_err(signing)
}

/// Registers an uploaded object as an owned Book plus its zero-progress
/// tracker.
///
/// The existence probe runs before any transaction opens: confirmation must
/// not fabricate a Book for an object that was never uploaded, and a missing
/// key is rejected cheaply. The store then performs the Book +
/// ReadingProgress insert pair atomically; a duplicate storage key surfaces
/// as `DuplicateResource`, the expected outcome of a retried confirmation.
pub async fn confirm_upload(
    objects: &dyn ObjectStore,
    store: &dyn LibraryStore,
    owner: &LocalUser,
    req: ConfirmUpload,
) -> CoreResult<Book> {
    let present = objects
        .exists(&req.storage_key)
        .await
        .map_err(upstream)?;
    if !present {
        return Err(CoreError::ObjectNotFound(req.storage_key));
    }

    let new_book = NewBook {
        id: Uuid::new_v4(),
        owner_id: owner.id.clone(),
        storage_key: req.storage_key,
        title: req.title,
        author: req.author,
        total_pages: req.total_pages,
    };

    match store.create_book_with_progress(new_book).await {
        Ok(book) => Ok(book),
        Err(PortError::UniqueViolation(_)) => Err(CoreError::DuplicateResource),
        Err(e) => Err(persistence(e)),
    }
}

/// Derives the completion percentage for a reading position.
///
/// Zero when the book's page count is unknown (less than 1); otherwise a
/// plain ratio times 100, unclamped, so a `current_page` past the end yields
/// a value over 100.
pub fn completion_percentage(current_page: i32, total_pages: i32) -> f64 {
    if total_pages < 1 {
        0.0
    } else {
        f64::from(current_page) / f64::from(total_pages) * 100.0
    }
}

/// Moves a user's reading position in a book.
///
/// The book must exist (`NotFound`) and belong to the caller (`Forbidden` —
/// checked explicitly, never inferred from which row the keyed update hits).
/// The percentage is derived server-side, never client-supplied.
pub async fn update_progress(
    store: &dyn LibraryStore,
    book_id: Uuid,
    user: &LocalUser,
    current_page: i32,
) -> CoreResult<ReadingProgress> {
    let book = find_book(store, book_id).await?;
    if book.owner_id != user.id {
        return Err(CoreError::Forbidden);
    }

    let percentage = completion_percentage(current_page, book.total_pages);
    store
        .update_progress(book_id, &user.id, current_page, percentage)
        .await
        .map_err(persistence)
}

/// Fetches a book on behalf of its owner, together with a signed read URL.
/// A caller who is not the owner gets `Forbidden` regardless of the book
/// existing.
pub async fn fetch_owned_book(
    store: &dyn LibraryStore,
    signer: &dyn ReadUrlSigner,
    book_id: Uuid,
    user: &LocalUser,
    read_window: Duration,
) -> CoreResult<(Book, String)> {
    let book = find_book(store, book_id).await?;
    if book.owner_id != user.id {
        return Err(CoreError::Forbidden);
    }

    let expires_at = Utc::now()
        + chrono::Duration::from_std(read_window)
            .map_err(|e| CoreError::Signing(e.to_string()))?;
    let read_url = issue_read_url(signer, &book.storage_key, expires_at)?;
    Ok((book, read_url))
}

/// Lists the caller's library.
pub async fn list_books(store: &dyn LibraryStore, user: &LocalUser) -> CoreResult<Vec<Book>> {
    store.books_by_owner(&user.id).await.map_err(persistence)
}

async fn find_book(store: &dyn LibraryStore, book_id: Uuid) -> CoreResult<Book> {
    match store.get_book(book_id).await {
        Ok(book) => Ok(book),
        Err(PortError::NotFound(_)) => Err(CoreError::NotFound),
        Err(e) => Err(persistence(e)),
    }
}

fn persistence(e: PortError) -> CoreError {
    match e {
        PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
        other => CoreError::Persistence(other.to_string()),
    }
}

fn upstream(e: PortError) -> CoreError {
    match e {
        PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
        other => CoreError::UpstreamUnavailable(other.to_string()),
    }
}

fn signing(e: PortError) -> CoreError {
    match e {
        PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
        other => CoreError::Signing(other.to_string()),
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    fn owner(id: &str) -> LocalUser {
        let now = Utc::now();
        LocalUser {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            username: None,
            first_name: None,
            last_name: None,
            phone: None,
            added_at: now,
            updated_at: now,
        }
    }

    /// In-memory `LibraryStore` that honors the transactional contract of
    /// `create_book_with_progress`: when the progress insert is forced to
    /// fail, the book insert is discarded with it.
    #[derive(Default)]
    struct FakeLibrary {
        books: Mutex<HashMap<Uuid, Book>>,
        progress: Mutex<HashMap<(Uuid, String), ReadingProgress>>,
        fail_progress_insert: Mutex<bool>,
    }

    impl FakeLibrary {
        fn book_count(&self, owner_id: &str) -> usize {
            self.books
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.owner_id == owner_id)
                .count()
        }
    }

    #[async_trait]
    impl LibraryStore for FakeLibrary {
        async fn create_book_with_progress(&self, new: NewBook) -> PortResult<Book> {
            let mut books = self.books.lock().unwrap();
            let keys: HashSet<_> = books.values().map(|b| b.storage_key.clone()).collect();
            if keys.contains(&new.storage_key) {
                return Err(PortError::UniqueViolation(new.storage_key));
            }
            if *self.fail_progress_insert.lock().unwrap() {
                // The transaction rolls back: nothing persists.
                return Err(PortError::Unavailable("progress insert failed".into()));
            }
            let now = Utc::now();
            let book = Book {
                id: new.id,
                owner_id: new.owner_id.clone(),
                storage_key: new.storage_key,
                title: new.title,
                author: new.author,
                total_pages: new.total_pages,
                added_at: now,
                updated_at: now,
            };
            books.insert(book.id, book.clone());
            self.progress.lock().unwrap().insert(
                (book.id, new.owner_id.clone()),
                ReadingProgress {
                    book_id: book.id,
                    user_id: new.owner_id,
                    current_page: 0,
                    percentage_complete: 0.0,
                    updated_at: now,
                },
            );
            Ok(book)
        }

        async fn get_book(&self, id: Uuid) -> PortResult<Book> {
            self.books
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(id.to_string()))
        }

        async fn books_by_owner(&self, owner_id: &str) -> PortResult<Vec<Book>> {
            Ok(self
                .books
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.owner_id == owner_id)
                .cloned()
                .collect())
        }

        async fn update_progress(
            &self,
            book_id: Uuid,
            user_id: &str,
            current_page: i32,
            percentage_complete: f64,
        ) -> PortResult<ReadingProgress> {
            let mut progress = self.progress.lock().unwrap();
            let row = progress
                .get_mut(&(book_id, user_id.to_string()))
                .ok_or_else(|| PortError::NotFound(book_id.to_string()))?;
            row.current_page = current_page;
            row.percentage_complete = percentage_complete;
            row.updated_at = Utc::now();
            Ok(row.clone())
        }
    }

    /// In-memory object store: a set of uploaded keys.
    #[derive(Default)]
    struct FakeObjects {
        keys: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl ObjectStore for FakeObjects {
        async fn exists(&self, key: &str) -> PortResult<bool> {
            Ok(self.keys.lock().unwrap().contains(key))
        }

        async fn presign_upload(&self, key: &str, expires_in: Duration) -> PortResult<String> {
            Ok(format!(
                "https://storage.test/{key}?X-Expires={}",
                expires_in.as_secs()
            ))
        }
    }

    struct FakeSigner;

    impl ReadUrlSigner for FakeSigner {
        fn signed_read_url(&self, key: &str, expires_at: DateTime<Utc>) -> PortResult<String> {
            Ok(format!(
                "https://cdn.test/{key}?Expires={}",
                expires_at.timestamp()
            ))
        }
    }

    fn request(key: &str) -> ConfirmUpload {
        ConfirmUpload {
            title: "Structure and Interpretation".to_string(),
            author: None,
            storage_key: key.to_string(),
            total_pages: 200,
        }
    }

    #[test]
    fn upload_keys_are_owner_namespaced() {
        assert_eq!(upload_key(&owner("user_1"), "sicp.pdf"), "user_1/sicp.pdf");
    }

    #[test]
    fn percentage_derivation() {
        assert_eq!(completion_percentage(50, 0), 0.0);
        assert_eq!(completion_percentage(50, -3), 0.0);
        assert_eq!(completion_percentage(50, 200), 25.0);
        assert!(completion_percentage(250, 200) > 100.0);
    }

    #[tokio::test]
    async fn confirmation_requires_an_uploaded_object() {
        let objects = FakeObjects::default();
        let store = FakeLibrary::default();
        let me = owner("user_1");

        let err = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ObjectNotFound(_)));
        assert_eq!(store.book_count(&me.id), 0);
    }

    #[tokio::test]
    async fn failed_progress_insert_persists_no_book() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        *store.fail_progress_insert.lock().unwrap() = true;
        let me = owner("user_1");

        let before = store.book_count(&me.id);
        let err = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Persistence(_)));
        assert_eq!(store.book_count(&me.id), before);
    }

    #[tokio::test]
    async fn duplicate_storage_key_conflicts() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");

        let book = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();
        assert_eq!(book.owner_id, me.id);

        let err = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource));
        assert_eq!(store.book_count(&me.id), 1);
    }

    #[tokio::test]
    async fn confirmation_creates_zero_progress() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");

        let book = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();
        let progress = store.progress.lock().unwrap();
        let row = progress.get(&(book.id, me.id.clone())).unwrap();
        assert_eq!(row.current_page, 0);
        assert_eq!(row.percentage_complete, 0.0);
    }

    #[tokio::test]
    async fn progress_update_derives_percentage() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");
        let book = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();

        let progress = update_progress(&store, book.id, &me, 50).await.unwrap();
        assert_eq!(progress.current_page, 50);
        assert_eq!(progress.percentage_complete, 25.0);

        let past_the_end = update_progress(&store, book.id, &me, 250).await.unwrap();
        assert!(past_the_end.percentage_complete > 100.0);
    }

    #[tokio::test]
    async fn progress_update_checks_ownership() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");
        let book = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();

        let err = update_progress(&store, book.id, &owner("user_2"), 50)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));

        let missing = update_progress(&store, Uuid::new_v4(), &me, 50)
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::NotFound));
    }

    #[tokio::test]
    async fn book_fetch_is_owner_only() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");
        let book = confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();

        let window = Duration::from_secs(300);
        let (found, read_url) = fetch_owned_book(&store, &FakeSigner, book.id, &me, window)
            .await
            .unwrap();
        assert_eq!(found.id, book.id);
        assert!(read_url.contains("user_1/sicp.pdf"));

        let err = fetch_owned_book(&store, &FakeSigner, book.id, &owner("user_2"), window)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
    }

    #[tokio::test]
    async fn listing_is_owner_scoped() {
        let objects = FakeObjects::default();
        objects.keys.lock().unwrap().insert("user_1/sicp.pdf".to_string());
        let store = FakeLibrary::default();
        let me = owner("user_1");
        confirm_upload(&objects, &store, &me, request("user_1/sicp.pdf"))
            .await
            .unwrap();

        assert_eq!(list_books(&store, &me).await.unwrap().len(), 1);
        assert!(list_books(&store, &owner("user_2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_url_carries_the_window() {
        let objects = FakeObjects::default();
        let url = issue_upload_url(&objects, "user_1/sicp.pdf", Duration::from_secs(15))
            .await
            .unwrap();
        assert!(url.contains("X-Expires=15"));
    }
}
