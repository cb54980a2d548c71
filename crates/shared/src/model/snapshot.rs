use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotType {
    Btrfs,
    Tar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTarget {
    pub id: Uuid,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: SnapshotType,
    pub location: String,
    pub created_at: Timestamp,
}
