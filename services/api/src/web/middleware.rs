//! services/api/src/web/middleware.rs
//!
//! The authentication middleware and the typed request-context binder.
//!
//! Every protected route runs verify → fetch → sync before its handler; the
//! resolved identity and local user ride the request as one strongly-typed
//! extension. Handlers take them through the [`Authenticated`] extractor, so
//! a handler reached without the pipeline is an internal fault, never a
//! silently unauthenticated request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use bookshelf_core::domain::{ExternalIdentity, LocalUser};
use bookshelf_core::{auth, CoreError};
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// The resolved identity pair bound to an authenticated request.
#[derive(Clone)]
pub struct AuthContext {
    pub identity: ExternalIdentity,
    pub user: LocalUser,
}

/// Middleware that authenticates the bearer credential and synchronizes the
/// local user row, binding both to the request.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = auth::authenticate(state.identity.as_ref(), auth_header).await?;
    debug!(subject = %identity.id, "credential verified");

    let user = auth::sync_user(state.users.as_ref(), &identity).await?;

    req.extensions_mut().insert(AuthContext { identity, user });
    Ok(next.run(req).await)
}

/// Extractor handing the bound [`AuthContext`] to a handler.
///
/// Absence means the route was mounted outside the auth middleware — a
/// pipeline-ordering bug, surfaced as an opaque internal error.
pub struct Authenticated(pub AuthContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(Authenticated)
            .ok_or(ApiError::Core(CoreError::ContextCorruption(
                "auth context missing; was the auth middleware skipped?",
            )))
    }
}
