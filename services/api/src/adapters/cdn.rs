//! services/api/src/adapters/cdn.rs
//!
//! Read-URL signer implementing the `ReadUrlSigner` port with CloudFront
//! canned-policy signatures: the policy JSON over the object URL is hashed
//! with SHA-1, signed with the distribution's RSA key (PKCS#1 v1.5), and the
//! signature rides in the query string alongside the expiry and key-pair ID.
//!
//! The private key is loaded once at startup and held for the process
//! lifetime; signing never touches the network.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bookshelf_core::ports::{PortError, PortResult, ReadUrlSigner};
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use sha1::{Digest, Sha1};
use std::path::Path;

use crate::error::ApiError;

pub struct CdnSigner {
    origin: String,
    key_pair_id: String,
    private_key: RsaPrivateKey,
}

impl CdnSigner {
    pub fn new(origin: String, key_pair_id: String, private_key: RsaPrivateKey) -> Self {
        Self {
            origin,
            key_pair_id,
            private_key,
        }
    }

    /// Loads the signing key from a PEM file, trying PKCS#1 first and
    /// falling back to a PKCS#8 container.
    pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, ApiError> {
        let pem = std::fs::read_to_string(path)?;
        match RsaPrivateKey::from_pkcs1_pem(&pem) {
            Ok(key) => Ok(key),
            Err(pkcs1_err) => RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|pkcs8_err| {
                ApiError::Internal(format!(
                    "signing key is neither PKCS#1 ({pkcs1_err}) nor PKCS#8 ({pkcs8_err})"
                ))
            }),
        }
    }

    fn canned_policy(resource: &str, expires: i64) -> String {
        format!(
            r#"{{"Statement":[{{"Resource":"{resource}","Condition":{{"DateLessThan":{{"AWS:EpochTime":{expires}}}}}}}]}}"#
        )
    }

    /// Base64 with the CloudFront-safe substitutions: `+` → `-`, `=` → `_`,
    /// `/` → `~`.
    fn url_safe(bytes: &[u8]) -> String {
        STANDARD
            .encode(bytes)
            .replace('+', "-")
            .replace('=', "_")
            .replace('/', "~")
    }
}

impl ReadUrlSigner for CdnSigner {
    fn signed_read_url(&self, key: &str, expires_at: DateTime<Utc>) -> PortResult<String> {
        let resource = format!("https://{}/{}", self.origin, key);
        let expires = expires_at.timestamp();

        let policy = Self::canned_policy(&resource, expires);
        let digest = Sha1::digest(policy.as_bytes());
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| PortError::Signing(format!("read-url signature: {e}")))?;

        Ok(format!(
            "{resource}?Expires={expires}&Signature={}&Key-Pair-Id={}",
            Self::url_safe(&signature),
            self.key_pair_id
        ))
    }
}
