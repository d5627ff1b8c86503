use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::PushConfig;
use crate::error::{AppError, PushError};
use crate::push::token::{ServiceAccountKey, TokenProvider};
use crate::push::{PushMessage, PushSender};
use crate::Result;

/// Firebase Cloud Messaging HTTP v1 client.
pub struct FcmClient {
    client: reqwest::Client,
    send_url: Url,
    tokens: TokenProvider,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

impl FcmClient {
    pub fn new(endpoint: &str, project_id: &str, tokens: TokenProvider, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {}", e)))?;

        Self::with_client(client, endpoint, project_id, tokens)
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
        project_id: &str,
        tokens: TokenProvider,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| AppError::ConfigError(format!("invalid push endpoint '{}': {}", endpoint, e)))?;
        let send_url = base
            .join(&format!("v1/projects/{}/messages:send", project_id))
            .map_err(|e| AppError::ConfigError(format!("invalid push project '{}': {}", project_id, e)))?;

        Ok(Self {
            client,
            send_url,
            tokens,
        })
    }

    /// Builds a client from settings, preferring a static access token over
    /// a service account key.
    pub fn from_config(config: &PushConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("cannot build HTTP client: {}", e)))?;

        let (tokens, key_project) = match (&config.access_token, &config.service_account_key_path) {
            (Some(token), _) if !token.is_empty() => (TokenProvider::fixed(token.clone()), None),
            (_, Some(path)) => {
                let key = ServiceAccountKey::from_file(path)?;
                let project = key.project_id.clone();
                (TokenProvider::service_account(key, http.clone()), project)
            }
            _ => {
                return Err(PushError::NotConfigured(
                    "set push.access_token or push.service_account_key_path".into(),
                )
                .into())
            }
        };

        let project_id = config
            .project_id
            .clone()
            .or(key_project)
            .ok_or_else(|| PushError::NotConfigured("push.project_id is not set".into()))?;

        Self::with_client(http, &config.endpoint, &project_id, tokens)
    }

    pub fn send_url(&self) -> &Url {
        &self.send_url
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<String> {
        let access_token = self.tokens.access_token().await?;

        let payload = json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                }
            }
        });

        let res = self
            .client
            .post(self.send_url.clone())
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let sent: SendResponse = res
            .json()
            .await
            .map_err(|e| PushError::RequestFailed(format!("unexpected FCM response: {}", e)))?;
        debug!("FCM accepted message {}", sent.name);

        Ok(sent.name)
    }
}
