//! services/api/src/adapters/s3.rs
//!
//! Object-storage adapter implementing the `ObjectStore` port with the AWS
//! S3 SDK: a head-object existence probe and presigned PUT URLs for uploads.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use bookshelf_core::ports::{ObjectStore, PortError, PortResult};
use std::time::Duration;

#[derive(Clone)]
pub struct S3Adapter {
    client: Client,
    bucket: String,
}

impl S3Adapter {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3Adapter {
    async fn exists(&self, key: &str) -> PortResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if e.err().is_not_found() => Ok(false),
            Err(SdkError::TimeoutError(_)) => {
                Err(PortError::Timeout("storage existence probe".to_string()))
            }
            Err(e) => Err(PortError::Unavailable(format!(
                "storage existence probe: {e}"
            ))),
        }
    }

    async fn presign_upload(&self, key: &str, expires_in: Duration) -> PortResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| PortError::Signing(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| PortError::Signing(format!("upload presign: {e}")))?;

        Ok(request.uri().to_string())
    }
}
