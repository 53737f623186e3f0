//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification. The handlers are thin: they
//! bind the request, delegate to the core workflows, and render the result.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use bookshelf_core::domain::{Book, LocalUser, ReadingProgress};
use bookshelf_core::library::{self, ConfirmUpload};
use bookshelf_core::CoreError;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::Authenticated;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        me_handler,
        upload_url_handler,
        confirm_book_handler,
        list_books_handler,
        get_book_handler,
        update_progress_handler,
    ),
    components(
        schemas(UploadBookRequest, UploadUrlResponse, ConfirmBookRequest, BookResponse,
                BookWithReadUrlResponse, UpdateProgressRequest, ProgressResponse, MeResponse)
    ),
    tags(
        (name = "Bookshelf API", description = "Personal digital-book library: uploads, confirmation and reading progress.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct UploadBookRequest {
    pub name: String,
}

#[derive(Serialize, ToSchema)]
pub struct UploadUrlResponse {
    pub presigned_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConfirmBookRequest {
    pub title: String,
    pub author: Option<String>,
    pub storage_key: String,
    pub total_pages: i32,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl From<LocalUser> for MeResponse {
    fn from(user: LocalUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub owner_id: String,
    pub storage_key: String,
    pub title: String,
    pub author: Option<String>,
    pub total_pages: i32,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            owner_id: book.owner_id,
            storage_key: book.storage_key,
            title: book.title,
            author: book.author,
            total_pages: book.total_pages,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookWithReadUrlResponse {
    pub book: BookResponse,
    pub read_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProgressRequest {
    pub current_page: i32,
}

#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub book_id: Uuid,
    pub current_page: i32,
    pub percentage_complete: f64,
}

impl From<ReadingProgress> for ProgressResponse {
    fn from(progress: ReadingProgress) -> Self {
        Self {
            book_id: progress.book_id,
            current_page: progress.current_page,
            percentage_complete: progress.percentage_complete,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the authenticated caller's local user record.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The caller's user record", body = MeResponse),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn me_handler(Authenticated(ctx): Authenticated) -> Json<MeResponse> {
    Json(ctx.user.into())
}

/// Issues a short-lived presigned upload URL for a new book file.
///
/// The object key is namespaced under the caller's ID; the client must PUT
/// to the URL promptly and then confirm via `POST /books`.
#[utoipa::path(
    post,
    path = "/upload-book",
    request_body = UploadBookRequest,
    responses(
        (status = 200, description = "Presigned PUT URL", body = UploadUrlResponse),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn upload_url_handler(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<UploadBookRequest>,
) -> Result<Json<UploadUrlResponse>, ApiError> {
    if req.name.is_empty() {
        return Err(CoreError::Validation("name must not be empty".to_string()).into());
    }

    let key = library::upload_key(&ctx.user, &req.name);
    let presigned_url = library::issue_upload_url(
        state.objects.as_ref(),
        &key,
        state.config.upload_url_expiry,
    )
    .await?;

    Ok(Json(UploadUrlResponse { presigned_url }))
}

/// Confirms a completed upload, registering the Book and its progress row.
#[utoipa::path(
    post,
    path = "/books",
    request_body = ConfirmBookRequest,
    responses(
        (status = 201, description = "Book registered", body = BookResponse),
        (status = 400, description = "No uploaded object at the named key"),
        (status = 409, description = "A book for this key already exists")
    )
)]
pub async fn confirm_book_handler(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Json(req): Json<ConfirmBookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.is_empty() {
        return Err(CoreError::Validation("title must not be empty".to_string()).into());
    }

    let book = library::confirm_upload(
        state.objects.as_ref(),
        state.library.as_ref(),
        &ctx.user,
        ConfirmUpload {
            title: req.title,
            author: req.author,
            storage_key: req.storage_key,
            total_pages: req.total_pages,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// Lists the caller's library.
#[utoipa::path(
    get,
    path = "/books",
    responses(
        (status = 200, description = "The caller's books", body = [BookResponse])
    )
)]
pub async fn list_books_handler(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books = library::list_books(state.library.as_ref(), &ctx.user).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// Fetches one of the caller's books together with a signed read URL against
/// the content-delivery origin.
#[utoipa::path(
    get,
    path = "/books/{book_id}",
    params(("book_id" = Uuid, Path, description = "The book's ID")),
    responses(
        (status = 200, description = "The book and a signed read URL", body = BookWithReadUrlResponse),
        (status = 403, description = "The caller does not own this book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookWithReadUrlResponse>, ApiError> {
    let (book, read_url) = library::fetch_owned_book(
        state.library.as_ref(),
        state.read_signer.as_ref(),
        book_id,
        &ctx.user,
        state.config.read_url_expiry,
    )
    .await?;

    Ok(Json(BookWithReadUrlResponse {
        book: book.into(),
        read_url,
    }))
}

/// Moves the caller's reading position in a book. The completion percentage
/// is derived server-side.
#[utoipa::path(
    patch,
    path = "/books/{book_id}/reading-progress",
    params(("book_id" = Uuid, Path, description = "The book's ID")),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "The updated progress row", body = ProgressResponse),
        (status = 403, description = "The caller does not own this book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn update_progress_handler(
    State(state): State<AppState>,
    Authenticated(ctx): Authenticated,
    Path(book_id): Path<Uuid>,
    Json(req): Json<UpdateProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let progress = library::update_progress(
        state.library.as_ref(),
        book_id,
        &ctx.user,
        req.current_page,
    )
    .await?;

    Ok(Json(progress.into()))
}
