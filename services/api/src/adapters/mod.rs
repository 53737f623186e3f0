pub mod cdn;
pub mod clerk;
pub mod db;
pub mod s3;

pub use cdn::CdnSigner;
pub use clerk::ClerkAdapter;
pub use db::DbAdapter;
pub use s3::S3Adapter;
