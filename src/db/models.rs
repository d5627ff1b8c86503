use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub fcm_token: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, fcm_token: Option<String>) -> Self {
        Self {
            id: id.into(),
            fcm_token,
        }
    }

    /// The push token, if it is usable. Blank tokens count as absent.
    pub fn push_token(&self) -> Option<&str> {
        self.fcm_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Medicine {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub next_dose: DateTime<Utc>,
    pub is_completed: bool,
}

impl Medicine {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        next_dose: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            next_dose,
            is_completed: false,
        }
    }

    /// Whether the dose falls inside `[from, to]` and has not been taken yet.
    pub fn is_due_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        !self.is_completed && self.next_dose >= from && self.next_dose <= to
    }
}
