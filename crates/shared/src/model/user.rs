use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// A local account. `totpSecret` and `recoveryCodes` are only set once TOTP
/// has been enrolled; a user with a secret must always carry a non-empty
/// recovery code set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub totp_secret: Option<String>,
    /// Argon2id hashes of single-use recovery codes; consumed entries are
    /// removed rather than flagged, so `len()` is always the remaining count.
    #[serde(default)]
    pub recovery_codes: Vec<String>,
    pub roles: Vec<Role>,
    pub created_at: Timestamp,
    pub locked_until: Option<Timestamp>,
    #[serde(default)]
    pub failed_attempts: u32,
    #[serde(default)]
    pub failed_attempts_window_start: Option<Timestamp>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    pub fn totp_armed(&self) -> bool {
        self.totp_secret.is_some()
    }

    pub fn is_locked(&self, now: Timestamp) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}
