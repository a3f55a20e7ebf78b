//! Firebase ID token authentication.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Google JWKS URL for Firebase Auth.
const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Firebase token issuer prefix.
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Minimum gap between refetches triggered by an unknown key ID.
const JWKS_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Decoded Firebase ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseClaims {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub auth_time: Option<i64>,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl From<FirebaseClaims> for AuthUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            email_verified: claims.email_verified.unwrap_or(false),
        }
    }
}

/// Turns a bearer token into a caller identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> ApiResult<AuthUser>;
}

pub type SharedVerifier = Arc<dyn TokenVerifier>;

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Verifies Firebase ID tokens against Google's rotating signing keys.
pub struct FirebaseVerifier {
    http: Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Option<Instant>>,
    last_attempt: Mutex<Option<Instant>>,
    project_id: String,
}

/// Whether to refetch the key set. A stale set is refetched; an unknown key ID
/// only triggers a refetch once the minimum interval has passed since the
/// last attempt.
fn should_refresh(
    last_refresh: Option<Instant>,
    last_attempt: Option<Instant>,
    missing: bool,
    now: Instant,
) -> bool {
    let since_attempt = last_attempt.map(|at| now.saturating_duration_since(at));
    if since_attempt.is_some_and(|gap| gap < JWKS_MIN_REFRESH_INTERVAL) {
        return false;
    }
    let stale = last_refresh.map_or(true, |at| now.saturating_duration_since(at) > JWKS_CACHE_TTL);
    stale || missing
}

impl FirebaseVerifier {
    pub async fn new(project_id: impl Into<String>) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::internal(format!("JWKS client: {}", e)))?;

        let verifier = Self {
            http,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
            last_attempt: Mutex::new(None),
            project_id: project_id.into(),
        };
        verifier.refresh_keys().await?;
        Ok(verifier)
    }

    /// Create from `FIREBASE_PROJECT_ID` or `GCP_PROJECT_ID`.
    pub async fn from_env() -> ApiResult<Self> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID")
            .or_else(|_| std::env::var("GCP_PROJECT_ID"))
            .map_err(|_| ApiError::internal("FIREBASE_PROJECT_ID or GCP_PROJECT_ID must be set"))?;
        Self::new(project_id).await
    }

    async fn refresh_keys(&self) -> ApiResult<()> {
        debug!("Refreshing JWKS keys");

        let jwks: JwksResponse = self
            .http
            .get(GOOGLE_JWKS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::internal(format!("JWKS fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("JWKS decode failed: {}", e)))?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys.insert(jwk.kid, key);
                }
                Err(e) => warn!(kid = %jwk.kid, "Skipping unusable JWKS key: {}", e),
            }
        }

        debug!("Refreshed {} JWKS keys", keys.len());
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }

    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let missing = !self.keys.read().await.contains_key(kid);
        let last_refresh = *self.last_refresh.read().await;

        let refresh = {
            let mut last_attempt = self.last_attempt.lock().await;
            let now = Instant::now();
            let due = should_refresh(last_refresh, *last_attempt, missing, now);
            if due {
                *last_attempt = Some(now);
            }
            due
        };

        if refresh {
            if let Err(e) = self.refresh_keys().await {
                warn!("Failed to refresh JWKS keys: {}", e);
            }
        } else if missing {
            debug!(kid = %kid, "Unknown key ID; refetch throttled");
        }

        self.keys.read().await.get(kid).cloned()
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> ApiResult<AuthUser> {
        let header = decode_header(token)
            .map_err(|e| ApiError::unauthorized(format!("Invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| ApiError::unauthorized("Token missing key ID"))?;
        let key = self
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthorized("Unknown key ID"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;
        if data.claims.sub.is_empty() {
            return Err(ApiError::unauthorized("Token has no subject"));
        }

        Ok(AuthUser::from(data.claims))
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(parts: &Parts) -> ApiResult<&str> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        state.verifier.verify(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/uploads");
        if let Some(value) = header {
            builder = builder.header("Authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))).unwrap(), "abc");
        assert!(bearer_token(&parts(None)).is_err());
        assert!(bearer_token(&parts(Some("Basic abc"))).is_err());
        assert!(bearer_token(&parts(Some("Bearer   "))).is_err());
    }

    #[test]
    fn test_claims_map_to_user() {
        let user = AuthUser::from(FirebaseClaims {
            sub: "u1".into(),
            email: Some("a@b.c".into()),
            email_verified: None,
            iss: String::new(),
            aud: String::new(),
            iat: 0,
            exp: 0,
            auth_time: None,
        });
        assert_eq!(user.uid, "u1");
        assert!(!user.email_verified);
    }

    #[test]
    fn test_unknown_key_refetch_is_throttled() {
        let now = Instant::now();
        let fresh = Some(now);

        // First unknown key after a fresh fetch refetches once
        assert!(should_refresh(fresh, None, true, now));
        // Further unknown keys inside the interval do not
        let attempt = Some(now);
        assert!(!should_refresh(fresh, attempt, true, now + Duration::from_secs(5)));
        assert!(should_refresh(
            fresh,
            attempt,
            true,
            now + JWKS_MIN_REFRESH_INTERVAL + Duration::from_secs(1)
        ));
        // A known key on a fresh set never refetches
        assert!(!should_refresh(fresh, None, false, now));
        // A stale set refetches, but still no more than once per interval
        let later = now + JWKS_CACHE_TTL + Duration::from_secs(1);
        assert!(should_refresh(fresh, None, false, later));
        assert!(!should_refresh(fresh, Some(later), false, later));
        assert!(should_refresh(None, None, false, now));
    }
}
