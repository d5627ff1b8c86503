use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::MedicineStore;
use crate::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub users_scanned: usize,
    pub medicines_reset: usize,
}

/// Clears the completion flag on every medicine of every user.
///
/// Each medicine is updated individually, whatever its current flag. The
/// first store error aborts the run.
pub async fn run_daily_reset(store: &dyn MedicineStore) -> Result<ResetReport> {
    let mut report = ResetReport::default();

    let users = store.list_users().await?;
    for user in &users {
        let medicines = store.list_medicines(&user.id).await?;
        for medicine in &medicines {
            store.set_completed(&user.id, &medicine.id, false).await?;
            report.medicines_reset += 1;
        }
        debug!("Reset {} medicines for user {}", medicines.len(), user.id);
        report.users_scanned += 1;
    }

    info!(
        "Daily reset cleared {} medicines across {} users",
        report.medicines_reset, report.users_scanned
    );
    Ok(report)
}
