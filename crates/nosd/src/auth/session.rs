use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use jiff::{Span, Timestamp};
use uuid::Uuid;

use shared::model::Session;

use super::ipclass::IpClassifier;

/// fsatomic-backed session store. Sessions are opaque ids; the cookie holds
/// nothing but the id, so revocation is just deleting the row.
pub struct SessionStore {
    path: PathBuf,
    ttl_secs: i64,
    rolling_ceiling_secs: i64,
    elevation_window_secs: i64,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: i64, rolling_ceiling_secs: i64, elevation_window_secs: i64) -> Self {
        Self {
            path: path.into(),
            ttl_secs,
            rolling_ceiling_secs,
            elevation_window_secs,
        }
    }

    fn load_all(&self) -> Result<Vec<Session>> {
        Ok(fsatomic::load_json(&self.path)?.unwrap_or_default())
    }

    fn save_all(&self, sessions: &[Session]) -> Result<()> {
        fsatomic::save_json(&self.path, &sessions, 0o600)
    }

    pub fn create(&self, user_id: Uuid, remember_me: bool, source_ip: IpAddr) -> Result<Session> {
        fsatomic::with_lock(&self.path, || {
            let mut sessions = self.load_all()?;
            let now = Timestamp::now();
            let session = Session {
                id: Uuid::new_v4(),
                user_id,
                issued_at: now,
                expires_at: extend(now, self.ttl_secs),
                remember_me,
                last_seen_ip: source_ip,
                elevated_until: None,
            };
            sessions.retain(|s| !s.is_expired(now));
            sessions.push(session.clone());
            self.save_all(&sessions)?;
            Ok(session)
        })
    }

    pub fn find(&self, id: Uuid) -> Result<Option<Session>> {
        let now = Timestamp::now();
        Ok(self
            .load_all()?
            .into_iter()
            .find(|s| s.id == id && !s.is_expired(now)))
    }

    /// Rolling refresh: extends `expiresAt` by the TTL, capped at
    /// `issuedAt + rolling_ceiling_secs` so a session can't be kept alive
    /// indefinitely by traffic alone.
    pub fn touch(&self, id: Uuid, source_ip: IpAddr) -> Result<Option<Session>> {
        fsatomic::with_lock(&self.path, || {
            let mut sessions = self.load_all()?;
            let now = Timestamp::now();
            let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            if session.is_expired(now) {
                return Ok(None);
            }

            session.last_seen_ip = source_ip;
            let ceiling = extend(session.issued_at, self.rolling_ceiling_secs);
            let refreshed = extend(now, self.ttl_secs);
            session.expires_at = refreshed.min(ceiling);

            let result = session.clone();
            self.save_all(&sessions)?;
            Ok(Some(result))
        })
    }

    /// Marks a session elevated after a successful TOTP check, for the
    /// configured elevation window.
    pub fn elevate(&self, id: Uuid) -> Result<Option<Session>> {
        fsatomic::with_lock(&self.path, || {
            let mut sessions = self.load_all()?;
            let now = Timestamp::now();
            let Some(session) = sessions.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            if session.is_expired(now) {
                return Ok(None);
            }

            let elevated_until = extend(now, self.elevation_window_secs).min(session.expires_at);
            session.elevated_until = Some(elevated_until);

            let result = session.clone();
            self.save_all(&sessions)?;
            Ok(Some(result))
        })
    }

    pub fn revoke(&self, id: Uuid) -> Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut sessions = self.load_all()?;
            sessions.retain(|s| s.id != id);
            self.save_all(&sessions)
        })
    }

    pub fn revoke_all_for_user(&self, user_id: Uuid) -> Result<()> {
        fsatomic::with_lock(&self.path, || {
            let mut sessions = self.load_all()?;
            sessions.retain(|s| s.user_id != user_id);
            self.save_all(&sessions)
        })
    }

    /// A session is elevated when either the classified source IP is
    /// LAN/VPN, or a recent-enough TOTP verification still covers `now`.
    pub fn is_elevated(&self, session: &Session, classifier: &IpClassifier) -> bool {
        if classifier.is_lan(session.last_seen_ip) {
            return true;
        }
        session.totp_elevated(Timestamp::now())
    }
}

fn extend(from: Timestamp, secs: i64) -> Timestamp {
    from.checked_add(Span::new().seconds(secs)).unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions.json"), 3600, 7 * 24 * 3600, 300)
    }

    fn lan_ip() -> IpAddr {
        IpAddr::from_str("192.168.1.50").unwrap()
    }

    fn wan_ip() -> IpAddr {
        IpAddr::from_str("8.8.8.8").unwrap()
    }

    #[test]
    fn create_then_find_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let user_id = Uuid::new_v4();
        let session = store.create(user_id, false, lan_ip()).unwrap();
        let found = store.find(session.id).unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
    }

    #[test]
    fn lan_session_is_elevated_without_totp() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let classifier = IpClassifier::new(None);
        let session = store.create(Uuid::new_v4(), false, lan_ip()).unwrap();
        assert!(store.is_elevated(&session, &classifier));
    }

    #[test]
    fn wan_session_is_not_elevated_without_totp() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let classifier = IpClassifier::new(None);
        let session = store.create(Uuid::new_v4(), false, wan_ip()).unwrap();
        assert!(!store.is_elevated(&session, &classifier));
    }

    #[test]
    fn totp_elevation_covers_wan_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let classifier = IpClassifier::new(None);
        let session = store.create(Uuid::new_v4(), false, wan_ip()).unwrap();
        let elevated = store.elevate(session.id).unwrap().unwrap();
        assert!(store.is_elevated(&elevated, &classifier));
    }

    #[test]
    fn revoke_removes_the_session() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = store.create(Uuid::new_v4(), false, lan_ip()).unwrap();
        store.revoke(session.id).unwrap();
        assert!(store.find(session.id).unwrap().is_none());
    }

    #[test]
    fn rolling_refresh_is_capped_by_ceiling() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions.json"), 3600, 3600, 300);
        let session = store.create(Uuid::new_v4(), false, lan_ip()).unwrap();
        let touched = store.touch(session.id, lan_ip()).unwrap().unwrap();
        assert!(touched.expires_at <= extend(session.issued_at, 3600));
    }
}
