//! Service-account access tokens for the Firestore REST API.
//!
//! Uses the OAuth2 JWT-bearer grant: a self-signed RS256 assertion is traded
//! at the token endpoint for a short-lived bearer token, which is cached until
//! shortly before it expires.

use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::storage::{StoreError, StoreResult};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Credentials of a Google service account.
#[derive(Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    pub token_uri: String,
}

impl ServiceAccount {
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
        }
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

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
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

/// Mints and caches bearer tokens for one service account.
pub struct TokenProvider {
    http: reqwest::Client,
    account: ServiceAccount,
    key: EncodingKey,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    /// Parses the private key up front so a bad key fails at startup.
    pub fn new(http: reqwest::Client, account: ServiceAccount) -> StoreResult<Self> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("invalid service account private key: {e}")))?;
        Ok(Self { http, account, key, cached: RwLock::new(None) })
    }

    /// Signed JWT assertion for the token exchange.
    pub fn assertion(&self, now_unix: i64) -> StoreResult<String> {
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: now_unix,
            exp: now_unix + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| StoreError::Auth(format!("sign assertion: {e}")))
    }

    /// Current bearer token, refreshing when missing or about to expire.
    pub async fn access_token(&self) -> StoreResult<String> {
        if let Some(tok) = self.cached.read().await.as_ref() {
            if tok.is_fresh() {
                return Ok(tok.value.clone());
            }
        }

        let mut slot = self.cached.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(tok) = slot.as_ref() {
            if tok.is_fresh() {
                return Ok(tok.value.clone());
            }
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    #[instrument(skip(self), fields(client_email = %self.account.client_email))]
    async fn fetch(&self) -> StoreResult<CachedToken> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;
        let issued = Instant::now();
        let resp = self
            .http
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Auth(format!("token request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("token endpoint returned {status}: {body}")));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("token response: {e}")))?;
        debug!(expires_in = token.expires_in, "obtained firestore access token");
        Ok(CachedToken {
            value: token.access_token,
            expires_at: issued + Duration::from_secs(token.expires_in),
        })
    }
}
