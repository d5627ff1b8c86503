//! Push delivery for dose reminders.
//!
//! Jobs depend on [`PushSender`]; [`FcmClient`] delivers through Firebase
//! Cloud Messaging using access tokens from a [`TokenProvider`].

mod fcm;
mod token;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use fcm::FcmClient;
pub use token::TokenProvider;

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
}

impl PushMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Sends `message` to one device. Returns the provider's message id.
    async fn send(&self, device_token: &str, message: &PushMessage) -> Result<String>;
}
