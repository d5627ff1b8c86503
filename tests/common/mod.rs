#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use medbuddy_scheduler::error::{AppError, DatabaseError};
use medbuddy_scheduler::{AppState, FcmClient, Medicine, MedicineStore, Result, Settings, User};
use medbuddy_scheduler::push::TokenProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Store backed by in-process maps, ordered by id like the Postgres queries.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<BTreeMap<String, User>>,
    medicines: RwLock<BTreeMap<(String, String), Medicine>>,
    fail_listing: RwLock<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, id: &str, fcm_token: Option<&str>) {
        self.users
            .write()
            .await
            .insert(id.to_string(), User::new(id, fcm_token.map(str::to_string)));
    }

    pub async fn add_medicine(&self, medicine: Medicine) {
        self.medicines
            .write()
            .await
            .insert((medicine.user_id.clone(), medicine.id.clone()), medicine);
    }

    pub async fn medicines(&self) -> Vec<Medicine> {
        self.medicines.read().await.values().cloned().collect()
    }

    pub async fn set_fail_listing(&self, fail: bool) {
        *self.fail_listing.write().await = fail;
    }
}

#[async_trait]
impl MedicineStore for InMemoryStore {
    async fn list_users(&self) -> Result<Vec<User>> {
        if *self.fail_listing.read().await {
            return Err(DatabaseError::ConnectionError("store unavailable".into()).into());
        }
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn list_medicines(&self, user_id: &str) -> Result<Vec<Medicine>> {
        Ok(self
            .medicines
            .read()
            .await
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn due_medicines(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Medicine>> {
        Ok(self
            .list_medicines(user_id)
            .await?
            .into_iter()
            .filter(|m| m.is_due_between(from, to))
            .collect())
    }

    async fn set_completed(&self, user_id: &str, medicine_id: &str, completed: bool) -> Result<()> {
        let mut medicines = self.medicines.write().await;
        let medicine = medicines
            .get_mut(&(user_id.to_string(), medicine_id.to_string()))
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        medicine.is_completed = completed;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if *self.fail_listing.read().await {
            return Err(DatabaseError::ConnectionError("store unavailable".into()).into());
        }
        Ok(())
    }
}

pub const PROJECT_ID: &str = "medbuddy-test";
pub const ACCESS_TOKEN: &str = "test-access-token";
pub const SEND_PATH: &str = "/v1/projects/medbuddy-test/messages:send";

pub fn fcm_client(endpoint: &str) -> FcmClient {
    FcmClient::new(
        endpoint,
        PROJECT_ID,
        TokenProvider::fixed(ACCESS_TOKEN),
        Duration::from_secs(2),
    )
    .expect("valid FCM client")
}

/// Application state over an in-memory store with FCM pointed at `endpoint`.
pub async fn test_state(store: Arc<InMemoryStore>, endpoint: &str) -> AppState {
    test_state_with(Settings::new_for_test().expect("test settings"), store, endpoint).await
}

pub async fn test_state_with(settings: Settings, store: Arc<InMemoryStore>, endpoint: &str) -> AppState {
    AppState::from_parts(settings, store, Arc::new(fcm_client(endpoint)))
        .await
        .expect("test state")
}
