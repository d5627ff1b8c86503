use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::db::{MedicineStore, Medicine};
use crate::error::AppError;
use crate::push::{PushMessage, PushSender};
use crate::Result;

pub const REMINDER_TITLE: &str = "Time for your medication";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReport {
    pub users_scanned: usize,
    pub users_skipped: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

pub fn reminder_for(medicine: &Medicine) -> PushMessage {
    PushMessage::new(
        REMINDER_TITLE,
        format!("It's time to take your {}", medicine.name),
    )
}

/// Sends a reminder for every uncompleted medicine whose next dose falls in
/// `[now, now + window]`.
///
/// Users without a push token are skipped. A failed send is logged and
/// counted; store errors abort the run.
pub async fn run_medication_notifier(
    store: &dyn MedicineStore,
    push: &dyn PushSender,
    now: DateTime<Utc>,
    window: Duration,
) -> Result<NotifyReport> {
    if window < Duration::zero() {
        return Err(AppError::ValidationError(format!(
            "dose window must not be negative, got {} minutes",
            window.num_minutes()
        )));
    }
    let window_end = now.checked_add_signed(window).ok_or_else(|| {
        AppError::ValidationError(format!(
            "dose window of {} minutes runs past the supported date range",
            window.num_minutes()
        ))
    })?;
    let mut report = NotifyReport::default();

    let users = store.list_users().await?;
    for user in &users {
        report.users_scanned += 1;

        let Some(token) = user.push_token() else {
            debug!("User {} has no push token, skipping", user.id);
            report.users_skipped += 1;
            continue;
        };

        let due = store.due_medicines(&user.id, now, window_end).await?;
        for medicine in &due {
            let message = reminder_for(medicine);
            match push.send(token, &message).await {
                Ok(message_id) => {
                    info!(
                        "Sent reminder for medicine {} to user {}: {}",
                        medicine.id, user.id, message_id
                    );
                    report.notifications_sent += 1;
                }
                Err(e) => {
                    error!(
                        "Error sending reminder for medicine {} to user {}: {}",
                        medicine.id, user.id, e
                    );
                    report.notifications_failed += 1;
                }
            }
        }
    }

    info!(
        "Medication notifier sent {} reminders ({} failed) for window {} .. {}",
        report.notifications_sent,
        report.notifications_failed,
        now.to_rfc3339(),
        window_end.to_rfc3339()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::operations::MockMedicineStore;
    use crate::db::User;
    use crate::error::{DatabaseError, PushError};
    use crate::push::MockPushSender;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_reminder_text() {
        let message = reminder_for(&Medicine::new("m1", "u1", "Aspirin", fixed_now()));
        assert_eq!(message.title, "Time for your medication");
        assert_eq!(message.body, "It's time to take your Aspirin");
    }

    #[test_log::test(tokio::test)]
    async fn test_sends_for_due_medicines_and_skips_tokenless_users() {
        let now = fixed_now();
        let mut store = MockMedicineStore::new();
        store.expect_list_users().returning(|| {
            Ok(vec![
                User::new("alice", Some("alice-device".into())),
                User::new("bob", None),
                User::new("carol", Some("  ".into())),
            ])
        });
        store
            .expect_due_medicines()
            .withf(move |user_id, from, to| {
                user_id == "alice" && *from == now && *to == now + Duration::hours(1)
            })
            .times(1)
            .returning(move |_, _, _| {
                Ok(vec![
                    Medicine::new("m1", "alice", "Aspirin", now + Duration::minutes(10)),
                    Medicine::new("m2", "alice", "Ibuprofen", now + Duration::minutes(50)),
                ])
            });

        let mut push = MockPushSender::new();
        push.expect_send()
            .withf(|token, message| token == "alice-device" && message.title == REMINDER_TITLE)
            .times(2)
            .returning(|_, _| Ok("projects/test/messages/1".into()));

        let report = run_medication_notifier(&store, &push, now, Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(
            report,
            NotifyReport {
                users_scanned: 3,
                users_skipped: 2,
                notifications_sent: 2,
                notifications_failed: 0,
            }
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_send_failure_does_not_abort_scan() {
        let now = fixed_now();
        let mut store = MockMedicineStore::new();
        store.expect_list_users().returning(|| {
            Ok(vec![
                User::new("alice", Some("stale-device".into())),
                User::new("bob", Some("bob-device".into())),
            ])
        });
        store.expect_due_medicines().times(2).returning(move |user_id, _, _| {
            Ok(vec![Medicine::new("m1", user_id, "Aspirin", now)])
        });

        let mut push = MockPushSender::new();
        push.expect_send()
            .withf(|token, _| token == "stale-device")
            .times(1)
            .returning(|_, _| {
                Err(PushError::Rejected { status: 404, body: "UNREGISTERED".into() }.into())
            });
        push.expect_send()
            .withf(|token, _| token == "bob-device")
            .times(1)
            .returning(|_, _| Ok("projects/test/messages/2".into()));

        let report = run_medication_notifier(&store, &push, now, Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.notifications_failed, 1);
        assert_eq!(report.users_scanned, 2);
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let mut store = MockMedicineStore::new();
        store
            .expect_list_users()
            .returning(|| Err(DatabaseError::ConnectionError("refused".into()).into()));
        let mut push = MockPushSender::new();
        push.expect_send().never();

        let result = run_medication_notifier(&store, &push, fixed_now(), Duration::hours(1)).await;
        assert!(matches!(result, Err(AppError::DatabaseError(DatabaseError::ConnectionError(_)))));
    }

    #[tokio::test]
    async fn test_negative_window_rejected() {
        let store = MockMedicineStore::new();
        let push = MockPushSender::new();

        let result = run_medication_notifier(&store, &push, fixed_now(), Duration::minutes(-5)).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_window_past_date_range_rejected() {
        let mut store = MockMedicineStore::new();
        store.expect_list_users().never();
        let push = MockPushSender::new();

        let window = Duration::weeks(1_000_000_000);
        let result = run_medication_notifier(&store, &push, fixed_now(), window).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }
}
