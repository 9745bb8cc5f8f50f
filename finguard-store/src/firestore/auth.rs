//! Service-account OAuth tokens
//!
//! TigerStyle: Sign once per hour, cache, refresh before expiry.
//!
//! Implements the JWT-bearer grant: an RS256 assertion signed with the
//! service-account key is exchanged at the token endpoint for a short-lived
//! access token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::ServiceAccount;
use crate::constants::{ASSERTION_LIFETIME_SECS, FIRESTORE_SCOPE, TOKEN_REFRESH_MARGIN_SECS};
use crate::error::{BackendError, StoreResult};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Claims of the signed assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Issues access tokens for one service account.
pub struct TokenSource {
    client: reqwest::Client,
    token_uri: String,
    client_email: String,
    key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Parse the service-account key.
    ///
    /// # Errors
    /// Returns error if the private key is not a valid RSA PEM.
    pub fn new(account: &ServiceAccount, token_uri: &str, client: reqwest::Client) -> StoreResult<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes()).map_err(|e| {
            BackendError::invalid_argument(format!("invalid service-account private key: {e}"))
        })?;

        Ok(Self {
            client,
            token_uri: token_uri.to_string(),
            client_email: account.client_email.clone(),
            key,
            cached: Mutex::new(None),
        })
    }

    /// A valid access token, fetched only when the cached one is stale.
    ///
    /// # Errors
    /// Returns error if signing or the token exchange fails.
    pub async fn token(&self) -> StoreResult<String> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange(now).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> StoreResult<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: FIRESTORE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| BackendError::internal(format!("failed to sign assertion: {e}")))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> StoreResult<CachedToken> {
        let assertion = self.sign_assertion(now)?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| BackendError::unavailable(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::unavailable(format!("token response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(token_error(status, &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::internal(format!("malformed token response: {e}")))?;
        let lifetime = parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);

        tracing::debug!(client_email = %self.client_email, lifetime, "access token refreshed");
        Ok(CachedToken {
            value: parsed.access_token,
            expires_at: now + Duration::seconds(lifetime),
        })
    }
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("token_uri", &self.token_uri)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

/// Map a failed token exchange. Rejected grants are credential problems;
/// server errors are outages.
fn token_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<TokenErrorResponse>(body)
        .map(|e| match e.error_description {
            Some(description) => format!("{}: {}", e.error, description),
            None => e.error,
        })
        .unwrap_or_else(|_| format!("HTTP {status}"));

    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        BackendError::unavailable(format!("token endpoint: {detail}"))
    } else {
        BackendError::unauthenticated(format!("token exchange rejected: {detail}"))
    }
}
