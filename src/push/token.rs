use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{AppError, PushError};
use crate::Result;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a Google service account key file that token minting needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "cannot read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigError(format!(
                "invalid service account key {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[derive(Debug, Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Supplies OAuth access tokens for the FCM API.
pub enum TokenProvider {
    Static(String),
    ServiceAccount {
        key: ServiceAccountKey,
        client: reqwest::Client,
        cached: RwLock<Option<CachedToken>>,
    },
}

impl TokenProvider {
    pub fn fixed(token: impl Into<String>) -> Self {
        TokenProvider::Static(token.into())
    }

    pub fn service_account(key: ServiceAccountKey, client: reqwest::Client) -> Self {
        TokenProvider::ServiceAccount {
            key,
            client,
            cached: RwLock::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::ServiceAccount { key, client, cached } => {
                let now = Utc::now();
                if let Some(token) = cached.read().await.as_ref() {
                    if token.is_fresh(now) {
                        return Ok(token.value.clone());
                    }
                }

                let mut slot = cached.write().await;
                // Another caller may have refreshed while we waited for the lock.
                if let Some(token) = slot.as_ref() {
                    if token.is_fresh(now) {
                        return Ok(token.value.clone());
                    }
                }

                let fresh = Self::exchange_assertion(key, client, now).await?;
                let value = fresh.value.clone();
                *slot = Some(fresh);
                Ok(value)
            }
        }
    }

    fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            iss: key.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: key.token_uri.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?;

        Ok(token)
    }

    async fn exchange_assertion(
        key: &ServiceAccountKey,
        client: &reqwest::Client,
        now: DateTime<Utc>,
    ) -> Result<CachedToken> {
        let assertion = Self::sign_assertion(key, now)?;
        debug!("Requesting access token for {}", key.client_email);

        let res = client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PushError::Credentials(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body
            ))
            .into());
        }

        let token: TokenResponse = res.json().await?;
        let expires_at = Duration::try_seconds(token.expires_in)
            .filter(|ttl| *ttl > Duration::zero())
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                PushError::Credentials(format!(
                    "token endpoint returned unusable expires_in {}",
                    token.expires_in
                ))
            })?;
        info!("Obtained access token valid for {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at,
        })
    }
}
