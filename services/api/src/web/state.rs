//! services/api/src/web/state.rs
//!
//! Defines the application's shared state: every port adapter plus the
//! configuration, constructed once at startup and passed by reference into
//! every handler. No ambient globals.

use crate::config::Config;
use bookshelf_core::ports::{IdentityProvider, LibraryStore, ObjectStore, ReadUrlSigner, UserStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserStore>,
    pub library: Arc<dyn LibraryStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub read_signer: Arc<dyn ReadUrlSigner>,
}
