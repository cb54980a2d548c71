use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SnapshotTarget;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTx {
    pub tx_id: Uuid,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub packages: Vec<String>,
    pub reason: String,
    pub targets: Vec<SnapshotTarget>,
    pub success: Option<bool>,
    pub notes: Vec<String>,
    /// Set once the engine has run the snapshot-restore compensations for
    /// this update, whether because a step failed mid-apply or because a
    /// caller invoked an explicit rollback afterwards.
    #[serde(default)]
    pub rolled_back: bool,
}

impl UpdateTx {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
