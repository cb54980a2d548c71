use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString},
};
use rand::Rng;
use rand::rngs::OsRng;
use uuid::Uuid;

use shared::auth::totp;

use super::users::UserStore;

const RECOVERY_CODE_COUNT: usize = 10;

/// Holds a secret between `enroll` and `verify` keyed by session id. Never
/// persisted: if `nosd` restarts mid-enrollment the operator just re-enrolls.
#[derive(Default)]
pub struct PendingEnrollments {
    secrets: Mutex<HashMap<Uuid, String>>,
}

impl PendingEnrollments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: Uuid, secret: String) {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id, secret);
    }

    pub fn take(&self, session_id: Uuid) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&session_id)
    }
}

/// Result of starting enrollment: the secret and QR URL are shown once and
/// never persisted in plaintext after `confirm` succeeds.
pub struct Enrollment {
    pub secret: String,
    pub otpauth_url: String,
}

/// Begins TOTP enrollment for `user_id`. Does not touch the user store; the
/// caller holds the secret client-side (in the session) until `confirm`.
pub fn begin_enrollment(account: &str) -> Result<Enrollment> {
    let secret = totp::generate_secret();
    let otpauth_url = totp::otpauth_url(&secret, account)?;
    Ok(Enrollment { secret, otpauth_url })
}

/// Verifies `code` against the pending `secret` and, if it matches, persists
/// the secret plus a freshly generated set of recovery codes. Returns the
/// plaintext recovery codes, which the caller must show exactly once.
pub fn confirm_enrollment(
    store: &UserStore,
    user_id: Uuid,
    account: &str,
    secret: &str,
    code: &str,
) -> Result<Option<Vec<String>>> {
    if !totp::verify_code(secret, account, code)? {
        return Ok(None);
    }

    let plaintext_codes = generate_recovery_codes();
    let hashed_codes = plaintext_codes
        .iter()
        .map(|c| hash_recovery_code(c))
        .collect::<Result<Vec<_>>>()?;

    store.set_totp(user_id, Some(secret.to_string()), hashed_codes)?;
    Ok(Some(plaintext_codes))
}

pub fn disable(store: &UserStore, user_id: Uuid) -> Result<()> {
    store.set_totp(user_id, None, Vec::new())
}

/// Replaces a user's recovery codes without touching their TOTP secret.
/// Requires the secret still be set (the caller checks that TOTP is armed).
pub fn regenerate_recovery_codes(store: &UserStore, user_id: Uuid, secret: String) -> Result<Vec<String>> {
    let plaintext_codes = generate_recovery_codes();
    let hashed_codes = plaintext_codes
        .iter()
        .map(|c| hash_recovery_code(c))
        .collect::<Result<Vec<_>>>()?;
    store.set_totp(user_id, Some(secret), hashed_codes)?;
    Ok(plaintext_codes)
}

/// Verifies a live TOTP code for an already-enrolled user.
pub fn verify(secret: &str, account: &str, code: &str) -> Result<bool> {
    totp::verify_code(secret, account, code)
}

/// Recovery codes are short numeric strings, so they can't go through
/// `shared::auth::password::hash_password`'s complexity gate. Hash them
/// directly with the same Argon2id parameters; `verify_password` only
/// inspects the PHC string, so it still verifies these.
fn hash_recovery_code(code: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash recovery code: {err}"))
}

fn generate_recovery_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..RECOVERY_CODE_COUNT)
        .map(|_| {
            let value: u32 = rng.gen_range(0..100_000_000);
            format!("{value:08}")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn enrollment_then_confirm_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        let user = store.create_admin("admin", "Sup3r$ecret").unwrap();

        let enrollment = begin_enrollment(&user.username).unwrap();
        let totp = shared::auth::totp::otpauth_url(&enrollment.secret, &user.username).unwrap();
        assert!(totp.contains("NithronOS"));

        // Can't derive a live code here without reimplementing the library,
        // so exercise the rejection path instead.
        let result =
            confirm_enrollment(&store, user.id, &user.username, &enrollment.secret, "000000")
                .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn recovery_codes_are_unique() {
        let codes = generate_recovery_codes();
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len());
    }
}
