use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use jiff::{Span, Timestamp};
use uuid::Uuid;

use shared::auth::password;
use shared::konst::{DEFAULT_LOGIN_LOCKOUT_ATTEMPTS, DEFAULT_LOGIN_LOCKOUT_WINDOW_SECS};
use shared::model::{Role, User};

/// fsatomic-backed user store. All reads/writes go through `with_lock` so a
/// login attempt and a concurrent password change never interleave.
pub struct UserStore {
    path: PathBuf,
    lockout_attempts: u32,
    lockout_window_secs: i64,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lockout_attempts: DEFAULT_LOGIN_LOCKOUT_ATTEMPTS,
            lockout_window_secs: DEFAULT_LOGIN_LOCKOUT_WINDOW_SECS,
        }
    }

    pub fn with_lockout_policy(mut self, attempts: u32, window_secs: i64) -> Self {
        self.lockout_attempts = attempts;
        self.lockout_window_secs = window_secs;
        self
    }

    fn load_all(&self) -> Result<Vec<User>> {
        Ok(fsatomic::load_json(&self.path)?.unwrap_or_default())
    }

    fn save_all(&self, users: &[User]) -> Result<()> {
        fsatomic::save_json(&self.path, &users, 0o600)
    }

    pub fn any_admin_exists(&self) -> Result<bool> {
        Ok(self.load_all()?.iter().any(|u| u.is_admin()))
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(username)))
    }

    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.load_all()?.into_iter().find(|u| u.id == id))
    }

    /// Creates the first admin account. Fails if any user already exists, so
    /// setup cannot be replayed to mint a second admin without going through
    /// normal user management.
    pub fn create_admin(&self, username: &str, password: &str) -> Result<User> {
        fsatomic::with_lock(&self.path, || {
            let mut users = self.load_all()?;
            if !users.is_empty() {
                bail!("users already exist");
            }
            password::validate_password_strength(password)?;
            let user = User {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password::hash_password(password)?,
                totp_secret: None,
                recovery_codes: Vec::new(),
                roles: vec![Role::Admin],
                created_at: Timestamp::now(),
                locked_until: None,
                failed_attempts: 0,
                failed_attempts_window_start: None,
            };
            users.push(user.clone());
            self.save_all(&users)?;
            Ok(user)
        })
    }

    /// Verifies `password` against the stored hash, applying and clearing
    /// the lockout counter as a side effect. Never reveals whether the
    /// username exists to the caller.
    pub fn verify_login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        fsatomic::with_lock(&self.path, || {
            let mut users = self.load_all()?;
            let Some(user) = users
                .iter_mut()
                .find(|u| u.username.eq_ignore_ascii_case(username))
            else {
                return Ok(LoginOutcome::InvalidCredentials);
            };

            let now = Timestamp::now();
            if user.is_locked(now) {
                return Ok(LoginOutcome::Locked);
            }

            if password::verify_password(password, &user.password_hash)? {
                user.failed_attempts = 0;
                user.failed_attempts_window_start = None;
                user.locked_until = None;
                let result = user.clone();
                self.save_all(&users)?;
                return Ok(LoginOutcome::Success(result));
            }

            self.record_failure(user, now);
            self.save_all(&users)?;
            Ok(LoginOutcome::InvalidCredentials)
        })
    }

    fn record_failure(&self, user: &mut User, now: Timestamp) {
        let window_start = user.failed_attempts_window_start.unwrap_or(now);
        let window_expired = now
            .since(window_start)
            .map(|span| span.get_seconds() >= self.lockout_window_secs)
            .unwrap_or(true);

        if window_expired {
            user.failed_attempts = 1;
            user.failed_attempts_window_start = Some(now);
        } else {
            user.failed_attempts += 1;
        }

        if user.failed_attempts >= self.lockout_attempts {
            let until = now
                .checked_add(Span::new().seconds(self.lockout_window_secs))
                .unwrap_or(now);
            user.locked_until = Some(until);
        }
    }

    pub fn set_password(&self, user_id: Uuid, new_password: &str) -> Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut users = self.load_all()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .context("user not found")?;
            password::validate_password_strength(new_password)?;
            user.password_hash = password::hash_password(new_password)?;
            self.save_all(&users)
        })
    }

    pub fn set_totp(&self, user_id: Uuid, secret: Option<String>, recovery_codes: Vec<String>) -> Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut users = self.load_all()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .context("user not found")?;
            user.totp_secret = secret;
            user.recovery_codes = recovery_codes;
            self.save_all(&users)
        })
    }

    /// Consumes a single-use recovery code, removing it so it cannot be
    /// replayed. Returns whether a match was found.
    pub fn consume_recovery_code(&self, user_id: Uuid, code: &str) -> Result<bool> {
        fsatomic::with_lock(&self.path, || {
            let mut users = self.load_all()?;
            let user = users
                .iter_mut()
                .find(|u| u.id == user_id)
                .context("user not found")?;
            let position = user
                .recovery_codes
                .iter()
                .position(|hash| password::verify_password(code, hash).unwrap_or(false));
            match position {
                Some(index) => {
                    user.recovery_codes.remove(index);
                    self.save_all(&users)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(User),
    InvalidCredentials,
    Locked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> UserStore {
        UserStore::new(dir.path().join("users.json"))
    }

    #[test]
    fn create_admin_then_login_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create_admin("admin", "Sup3r$ecret").unwrap();

        match store.verify_login("admin", "Sup3r$ecret").unwrap() {
            LoginOutcome::Success(user) => assert!(user.is_admin()),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn second_admin_creation_fails() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create_admin("admin", "Sup3r$ecret").unwrap();
        assert!(store.create_admin("other", "Sup3r$ecret2").is_err());
    }

    #[test]
    fn repeated_failures_lock_account() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).with_lockout_policy(3, 900);
        store.create_admin("admin", "Sup3r$ecret").unwrap();

        for _ in 0..3 {
            let _ = store.verify_login("admin", "wrong-password").unwrap();
        }

        match store.verify_login("admin", "Sup3r$ecret").unwrap() {
            LoginOutcome::Locked => {}
            other => panic!("expected locked, got {other:?}"),
        }
    }

    #[test]
    fn unknown_username_is_invalid_credentials_not_locked() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.create_admin("admin", "Sup3r$ecret").unwrap();

        match store.verify_login("ghost", "whatever").unwrap() {
            LoginOutcome::InvalidCredentials => {}
            other => panic!("expected invalid credentials, got {other:?}"),
        }
    }
}
