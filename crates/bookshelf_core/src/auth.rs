//! crates/bookshelf_core/src/auth.rs
//!
//! The request-authentication pipeline: bearer-credential parsing, identity
//! verification against the external provider, and the idempotent sync of an
//! external identity onto a local user row.
//!
//! Every authenticated request runs `authenticate` followed by `sync_user`;
//! the service layer binds the results to the request context so handlers
//! never re-resolve them.

use crate::domain::{ExternalIdentity, LocalUser, NewUser};
use crate::error::{CoreError, CoreResult};
use crate::ports::{IdentityProvider, PortError, UserStore};

/// Extracts the token from a raw `Authorization` header value.
///
/// The value must be exactly two space-separated tokens, the first being the
/// literal scheme name `Bearer`. An absent or empty header is
/// `MissingCredential`; anything else that fails the shape check is
/// `MalformedCredential` (a distinct, "not acceptable" condition).
pub fn parse_bearer(header: Option<&str>) -> CoreResult<&str> {
    let header = match header {
        None | Some("") => return Err(CoreError::MissingCredential),
        Some(h) => h,
    };

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(CoreError::MalformedCredential),
    }
}

/// Verifies a bearer credential and resolves it to a full identity record.
///
/// Provider rejection of the token is `InvalidCredential` and is never
/// retried; token validity is a point-in-time fact. A failure of the
/// secondary subject-to-record lookup is `UpstreamUnavailable` — the pipeline
/// must not proceed with a verified subject it cannot resolve.
pub async fn authenticate(
    provider: &dyn IdentityProvider,
    auth_header: Option<&str>,
) -> CoreResult<ExternalIdentity> {
    let token = parse_bearer(auth_header)?;

    let subject = provider.verify_token(token).await.map_err(|e| match e {
        PortError::CredentialRejected => CoreError::InvalidCredential,
        PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
        other => CoreError::UpstreamUnavailable(other.to_string()),
    })?;

    provider
        .fetch_identity(&subject)
        .await
        .map_err(|e| match e {
            PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
            other => CoreError::UpstreamUnavailable(other.to_string()),
        })
}

/// Resolves the identity's designated primary email, if any.
///
/// Both a missing reference and a reference that matches no entry in the set
/// yield `None`.
pub fn primary_email(identity: &ExternalIdentity) -> Option<String> {
    let primary_id = identity.primary_email_id.as_deref()?;
    identity
        .email_addresses
        .iter()
        .find(|e| e.id == primary_id)
        .map(|e| e.address.clone())
}

/// Resolves the identity's designated primary phone number, if any.
pub fn primary_phone(identity: &ExternalIdentity) -> Option<String> {
    let primary_id = identity.primary_phone_id.as_deref()?;
    identity
        .phone_numbers
        .iter()
        .find(|p| p.id == primary_id)
        .map(|p| p.number.clone())
}

/// Maps an external identity onto the local user row, creating it on first
/// sight. Idempotent: an existing row is returned unchanged, with no field
/// refresh.
///
/// A resolvable primary email is mandatory for account creation; without one
/// the sync fails with `MissingRequiredAttribute` and no row is written.
///
/// Two simultaneous first-requests race to insert; the store's unique
/// constraint on the primary key is the sole race-breaker. The loser
/// re-fetches the winner's row and returns it, surfacing `DuplicateUser`
/// only if that re-fetch misses as well.
pub async fn sync_user(store: &dyn UserStore, identity: &ExternalIdentity) -> CoreResult<LocalUser> {
    match store.get_user(&identity.id).await {
        Ok(user) => return Ok(user),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(persistence(e)),
    }

    let email =
        primary_email(identity).ok_or(CoreError::MissingRequiredAttribute("primary email"))?;

    let new_user = NewUser {
        id: identity.id.clone(),
        email,
        username: identity.username.clone(),
        first_name: identity.first_name.clone(),
        last_name: identity.last_name.clone(),
        phone: primary_phone(identity),
    };

    match store.create_user(new_user).await {
        Ok(user) => Ok(user),
        Err(PortError::UniqueViolation(_)) => match store.get_user(&identity.id).await {
            Ok(user) => Ok(user),
            Err(PortError::NotFound(_)) => Err(CoreError::DuplicateUser),
            Err(e) => Err(persistence(e)),
        },
        Err(e) => Err(persistence(e)),
    }
}

fn persistence(e: PortError) -> CoreError {
    match e {
        PortError::Timeout(m) => CoreError::DeadlineExceeded(m),
        other => CoreError::Persistence(other.to_string()),
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailAddress, PhoneNumber};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn identity(id: &str) -> ExternalIdentity {
        ExternalIdentity {
            id: id.to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            username: Some("ada".to_string()),
            email_addresses: vec![
                EmailAddress {
                    id: "em_1".to_string(),
                    address: "old@example.com".to_string(),
                },
                EmailAddress {
                    id: "em_2".to_string(),
                    address: "ada@example.com".to_string(),
                },
            ],
            primary_email_id: Some("em_2".to_string()),
            phone_numbers: vec![PhoneNumber {
                id: "ph_1".to_string(),
                number: "+15550100".to_string(),
            }],
            primary_phone_id: Some("ph_1".to_string()),
        }
    }

    /// In-memory `UserStore` with a switch that makes the next insert lose
    /// the first-sync race.
    #[derive(Default)]
    struct FakeUserStore {
        rows: Mutex<HashMap<String, LocalUser>>,
        lose_insert_race: Mutex<bool>,
        creates: Mutex<u32>,
    }

    #[async_trait]
    impl UserStore for FakeUserStore {
        async fn get_user(&self, id: &str) -> PortResult<LocalUser> {
            self.rows
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(id.to_string()))
        }

        async fn create_user(&self, user: NewUser) -> PortResult<LocalUser> {
            *self.creates.lock().unwrap() += 1;
            let mut rows = self.rows.lock().unwrap();
            let mut lose = self.lose_insert_race.lock().unwrap();
            if rows.contains_key(&user.id) || *lose {
                // Simulate the concurrent winner committing first.
                if *lose {
                    *lose = false;
                    let winner = row(&user.id, "winner@example.com");
                    rows.insert(user.id.clone(), winner);
                }
                return Err(PortError::UniqueViolation(user.id));
            }
            let now = Utc::now();
            let created = LocalUser {
                id: user.id.clone(),
                email: user.email,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                phone: user.phone,
                added_at: now,
                updated_at: now,
            };
            rows.insert(user.id, created.clone());
            Ok(created)
        }
    }

    fn row(id: &str, email: &str) -> LocalUser {
        let now = Utc::now();
        LocalUser {
            id: id.to_string(),
            email: email.to_string(),
            username: None,
            first_name: None,
            last_name: None,
            phone: None,
            added_at: now,
            updated_at: now,
        }
    }

    struct FakeProvider;

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        async fn verify_token(&self, token: &str) -> PortResult<String> {
            if token == "good" {
                Ok("user_1".to_string())
            } else {
                Err(PortError::CredentialRejected)
            }
        }

        async fn fetch_identity(&self, subject: &str) -> PortResult<ExternalIdentity> {
            if subject == "user_1" {
                Ok(identity(subject))
            } else {
                Err(PortError::Unavailable("no record".to_string()))
            }
        }
    }

    #[test]
    fn bearer_with_wrong_scheme_is_malformed() {
        assert!(matches!(
            parse_bearer(Some("Token abc")),
            Err(CoreError::MalformedCredential)
        ));
    }

    #[test]
    fn empty_header_is_missing() {
        assert!(matches!(
            parse_bearer(Some("")),
            Err(CoreError::MissingCredential)
        ));
        assert!(matches!(
            parse_bearer(None),
            Err(CoreError::MissingCredential)
        ));
    }

    #[test]
    fn bearer_shape_is_strict() {
        assert_eq!(parse_bearer(Some("Bearer abc")).unwrap(), "abc");
        assert!(matches!(
            parse_bearer(Some("Bearer abc extra")),
            Err(CoreError::MalformedCredential)
        ));
        assert!(matches!(
            parse_bearer(Some("Bearer")),
            Err(CoreError::MalformedCredential)
        ));
        assert!(matches!(
            parse_bearer(Some("Bearer ")),
            Err(CoreError::MalformedCredential)
        ));
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let err = authenticate(&FakeProvider, Some("Bearer expired"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidCredential));
    }

    #[tokio::test]
    async fn authenticate_resolves_full_identity() {
        let identity = authenticate(&FakeProvider, Some("Bearer good"))
            .await
            .unwrap();
        assert_eq!(identity.id, "user_1");
    }

    #[test]
    fn primary_email_follows_the_reference() {
        let id = identity("user_1");
        assert_eq!(primary_email(&id).unwrap(), "ada@example.com");
        assert_eq!(primary_phone(&id).unwrap(), "+15550100");
    }

    #[test]
    fn dangling_primary_reference_is_absent() {
        let mut id = identity("user_1");
        id.primary_email_id = Some("em_404".to_string());
        assert!(primary_email(&id).is_none());
        id.primary_email_id = None;
        assert!(primary_email(&id).is_none());
    }

    #[tokio::test]
    async fn sync_is_idempotent() {
        let store = FakeUserStore::default();
        let id = identity("user_1");
        let first = sync_user(&store, &id).await.unwrap();
        let second = sync_user(&store, &id).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.email, second.email);
        assert_eq!(second.email, "ada@example.com");
        assert_eq!(*store.creates.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn sync_without_primary_email_creates_nothing() {
        let store = FakeUserStore::default();
        let mut id = identity("user_1");
        id.primary_email_id = None;
        let err = sync_user(&store, &id).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingRequiredAttribute(_)));
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn race_loser_returns_the_winners_row() {
        let store = FakeUserStore::default();
        *store.lose_insert_race.lock().unwrap() = true;
        let user = sync_user(&store, &identity("user_1")).await.unwrap();
        assert_eq!(user.email, "winner@example.com");
        assert_eq!(store.rows.lock().unwrap().len(), 1);
    }
}
