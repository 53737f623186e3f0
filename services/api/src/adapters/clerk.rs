//! services/api/src/adapters/clerk.rs
//!
//! Identity-provider adapter implementing the `IdentityProvider` port against
//! Clerk. Session tokens are RS256 JWTs verified locally against the
//! instance's PEM public key; the full identity record is fetched from the
//! backend API with the secret key.

use async_trait::async_trait;
use bookshelf_core::domain::{EmailAddress, ExternalIdentity, PhoneNumber};
use bookshelf_core::ports::{IdentityProvider, PortError, PortResult};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::time::Duration;

use crate::error::ApiError;

/// Timeout for identity-record fetches; keeps a slow provider from pinning
/// request workers past the deadline.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ClerkAdapter {
    http: reqwest::Client,
    api_url: String,
    secret_key: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl ClerkAdapter {
    /// Builds the adapter from the instance's PEM public key and backend API
    /// credentials. Fails fast on an unparseable key.
    pub fn new(
        public_key_pem: &[u8],
        api_url: String,
        secret_key: String,
    ) -> Result<Self, ApiError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| ApiError::Internal(format!("identity public key: {e}")))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;

        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            http,
            api_url,
            secret_key,
            decoding_key,
            validation,
        })
    }
}

//=========================================================================================
// Provider Wire Shapes
//=========================================================================================

#[derive(Deserialize)]
struct SessionClaims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

#[derive(Deserialize)]
struct WireEmail {
    id: String,
    email_address: String,
}

#[derive(Deserialize)]
struct WirePhone {
    id: String,
    phone_number: String,
}

/// The provider's user record, as returned by `GET /v1/users/{id}`.
#[derive(Deserialize)]
struct WireUser {
    id: String,
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    #[serde(default)]
    email_addresses: Vec<WireEmail>,
    primary_email_address_id: Option<String>,
    #[serde(default)]
    phone_numbers: Vec<WirePhone>,
    primary_phone_number_id: Option<String>,
}

impl WireUser {
    fn to_domain(self) -> ExternalIdentity {
        ExternalIdentity {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
            email_addresses: self
                .email_addresses
                .into_iter()
                .map(|e| EmailAddress {
                    id: e.id,
                    address: e.email_address,
                })
                .collect(),
            primary_email_id: self.primary_email_address_id,
            phone_numbers: self
                .phone_numbers
                .into_iter()
                .map(|p| PhoneNumber {
                    id: p.id,
                    number: p.phone_number,
                })
                .collect(),
            primary_phone_id: self.primary_phone_number_id,
        }
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for ClerkAdapter {
    async fn verify_token(&self, token: &str) -> PortResult<String> {
        // Any decode failure (bad signature, expired, garbled) is a
        // rejection; there is nothing transport-level to distinguish here.
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|_| PortError::CredentialRejected)?;
        Ok(data.claims.sub)
    }

    async fn fetch_identity(&self, subject: &str) -> PortResult<ExternalIdentity> {
        let url = format!("{}/v1/users/{}", self.api_url, subject);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PortError::Timeout(format!("identity fetch: {e}"))
                } else {
                    PortError::Unavailable(format!("identity fetch: {e}"))
                }
            })?;

        if !response.status().is_success() {
            return Err(PortError::Unavailable(format!(
                "identity fetch returned {}",
                response.status()
            )));
        }

        let user: WireUser = response
            .json()
            .await
            .map_err(|e| PortError::Unavailable(format!("identity decode: {e}")))?;

        Ok(user.to_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_user_maps_onto_the_identity_record() {
        let raw = serde_json::json!({
            "id": "user_2abc",
            "first_name": "Ada",
            "last_name": null,
            "username": "ada",
            "email_addresses": [
                {"id": "idn_1", "email_address": "ada@example.com"}
            ],
            "primary_email_address_id": "idn_1",
            "phone_numbers": [],
            "primary_phone_number_id": null
        });

        let user: WireUser = serde_json::from_value(raw).unwrap();
        let identity = user.to_domain();
        assert_eq!(identity.id, "user_2abc");
        assert_eq!(identity.email_addresses.len(), 1);
        assert_eq!(identity.primary_email_id.as_deref(), Some("idn_1"));
        assert!(identity.phone_numbers.is_empty());
    }

    #[test]
    fn unknown_provider_fields_are_ignored() {
        let raw = serde_json::json!({
            "id": "user_2abc",
            "object": "user",
            "first_name": null,
            "last_name": null,
            "username": null,
            "banned": false
        });

        let user: WireUser = serde_json::from_value(raw).unwrap();
        assert!(user.email_addresses.is_empty());
    }
}
