//! Caller identity, as minted by the external auth service.
//!
//! This backend performs no login or session issuance. The dashboard's auth
//! layer signs an HS256 session token carrying `{sub, org, role}`; we verify
//! the signature and expiry with the shared secret and trust the claims
//! completely. Tenant scoping everywhere else keys off `org_id`.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::AppState;

const COOKIE_NAME: &str = "session";

/// The authenticated caller: user, tenant, and role.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub role: String,
}

// Expiry is enforced by the decoder's validation; the claim itself never
// needs to surface here.
#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    org: String,
    #[serde(default)]
    role: Option<String>,
}

/// Verifies session tokens against the secret shared with the auth service.
#[derive(Clone)]
pub struct SessionVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AppError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!("session verification failed: {}", e);
                AppError::Unauthorized
            })?;
        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
        let org_id = Uuid::parse_str(&data.claims.org).map_err(|_| AppError::Unauthorized)?;
        Ok(Identity {
            user_id,
            org_id,
            role: data.claims.role.unwrap_or_else(|| "viewer".into()),
        })
    }
}

/// Pull the session token from `Authorization: Bearer ...` or, failing that,
/// the `session` cookie set by the auth service for browser callers.
fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(bearer) = parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }

    let cookies = parts.headers.get("cookie")?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == COOKIE_NAME).then(|| value.to_string())
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(AppError::Unauthorized)?;
        state.sessions.verify(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        org: &'a str,
        role: &'a str,
        exp: usize,
    }

    fn mint(secret: &str, sub: &str, org: &str, exp: usize) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub,
                org,
                role: "admin",
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn valid_token_yields_identity() {
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let token = mint("s3cret", &user.to_string(), &org.to_string(), far_future());

        let identity = SessionVerifier::new("s3cret").verify(&token).unwrap();
        assert_eq!(identity.user_id, user);
        assert_eq!(identity.org_id, org);
        assert_eq!(identity.role, "admin");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = mint(
            "s3cret",
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            far_future(),
        );
        let err = SessionVerifier::new("other").verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = mint(
            "s3cret",
            &Uuid::new_v4().to_string(),
            &Uuid::new_v4().to_string(),
            1,
        );
        let err = SessionVerifier::new("s3cret").verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn non_uuid_claims_are_rejected() {
        let token = mint("s3cret", "alice", "acme", far_future());
        let err = SessionVerifier::new("s3cret").verify(&token).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let err = SessionVerifier::new("s3cret")
            .verify("not.a.token")
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
