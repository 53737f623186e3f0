pub mod auth;
pub mod domain;
pub mod error;
pub mod library;
pub mod ports;

pub use domain::{Book, EmailAddress, ExternalIdentity, LocalUser, NewBook, NewUser, PhoneNumber, ReadingProgress};
pub use error::{CoreError, CoreResult};
pub use ports::{IdentityProvider, LibraryStore, ObjectStore, PortError, PortResult, ReadUrlSigner, UserStore};
