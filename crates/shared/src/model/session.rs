use std::net::IpAddr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub remember_me: bool,
    pub last_seen_ip: IpAddr,
    pub elevated_until: Option<Timestamp>,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// True if a recent TOTP verification still covers `now`. Does not by
    /// itself decide elevation: callers must also check IP classification.
    pub fn totp_elevated(&self, now: Timestamp) -> bool {
        self.elevated_until.is_some_and(|until| now < until)
    }
}
