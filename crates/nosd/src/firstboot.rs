use std::path::PathBuf;

use anyhow::Result;
use jiff::{Span, Timestamp};
use rand::Rng;

use shared::model::{FirstBootState, LegacyFirstBootState};

/// fsatomic-backed first-boot OTP. The OTP printed to the console at setup
/// time stays valid (and is re-shown, not regenerated) until it expires, so
/// restarting `nosd` mid-setup doesn't invalidate whatever the operator
/// already copied down.
pub struct FirstBootStore {
    path: PathBuf,
    ttl_secs: i64,
}

impl FirstBootStore {
    pub fn new(path: impl Into<PathBuf>, ttl_secs: i64) -> Self {
        Self {
            path: path.into(),
            ttl_secs,
        }
    }

    fn load(&self) -> Result<Option<FirstBootState>> {
        match fsatomic::load_json::<FirstBootState>(&self.path) {
            Ok(state) => Ok(state),
            Err(_) => match fsatomic::load_json::<LegacyFirstBootState>(&self.path)? {
                Some(legacy) if !legacy.used => Ok(Some(FirstBootState {
                    otp: legacy.otp,
                    issued_at: legacy.created_at,
                    expires_at: extend(legacy.created_at, self.ttl_secs),
                })),
                _ => Ok(None),
            },
        }
    }

    /// Returns the current first-boot OTP, generating a new one with the
    /// system RNG if none exists or the previous one has expired. The bool
    /// reports whether the existing OTP was reused.
    pub fn new_or_reuse(&self) -> Result<(FirstBootState, bool)> {
        self.new_or_reuse_with(&mut rand::thread_rng())
    }

    /// Same as `new_or_reuse`, but with the RNG supplied by the caller so
    /// the deterministic case (tests supplying a seeded `Rng`) doesn't need
    /// the system RNG at all.
    pub fn new_or_reuse_with(&self, gen: &mut impl Rng) -> Result<(FirstBootState, bool)> {
        fsatomic::with_lock(&self.path, || {
            let now = Timestamp::now();
            if let Some(existing) = self.load()?
                && !existing.is_expired(now)
            {
                return Ok((existing, true));
            }

            let state = FirstBootState {
                otp: generate_otp(gen),
                issued_at: now,
                expires_at: extend(now, self.ttl_secs),
            };
            fsatomic::save_json(&self.path, &state, 0o600)?;
            Ok((state, false))
        })
    }

    /// Verifies `candidate` against the current OTP. An expired OTP never
    /// verifies, even if the string still happens to match.
    pub fn verify(&self, candidate: &str) -> Result<bool> {
        let Some(state) = self.load()? else {
            return Ok(false);
        };
        let now = Timestamp::now();
        Ok(!state.is_expired(now) && constant_time_eq(&state.otp, candidate))
    }

    /// Clears the OTP once the admin account has been created, so it can
    /// never be replayed.
    pub fn consume(&self) -> Result<()> {
        fsatomic::with_lock(&self.path, || {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            Ok(())
        })
    }
}

fn extend(from: Timestamp, secs: i64) -> Timestamp {
    from.checked_add(Span::new().seconds(secs)).unwrap_or(from)
}

fn generate_otp(rng: &mut impl Rng) -> String {
    let value: u32 = rng.gen_range(0..1_000_000);
    format!("{value:06}")
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generates_then_reuses_otp() {
        let dir = TempDir::new().unwrap();
        let store = FirstBootStore::new(dir.path().join("firstboot.json"), 900);

        let (first, reused) = store.new_or_reuse().unwrap();
        assert!(!reused);
        let (second, reused) = store.new_or_reuse().unwrap();
        assert!(reused);
        assert_eq!(first.otp, second.otp);
    }

    #[test]
    fn verify_rejects_wrong_otp() {
        let dir = TempDir::new().unwrap();
        let store = FirstBootStore::new(dir.path().join("firstboot.json"), 900);
        let (state, _) = store.new_or_reuse().unwrap();
        assert_eq!(state.otp.len(), 6);
        assert!(store.verify(&state.otp).unwrap());
        assert!(!store.verify("000000").unwrap());
    }

    #[test]
    fn new_or_reuse_with_seeded_rng_is_deterministic() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let dir = TempDir::new().unwrap();
        let store = FirstBootStore::new(dir.path().join("firstboot.json"), 900);
        let (state, reused) = store.new_or_reuse_with(&mut StdRng::seed_from_u64(42)).unwrap();
        assert!(!reused);
        assert_eq!(state.otp.len(), 6);
        assert!(state.otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn consume_removes_state() {
        let dir = TempDir::new().unwrap();
        let store = FirstBootStore::new(dir.path().join("firstboot.json"), 900);
        let (state, _) = store.new_or_reuse().unwrap();
        store.consume().unwrap();
        assert!(!store.verify(&state.otp).unwrap());
    }

    #[test]
    fn migrates_legacy_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("firstboot.json");
        let legacy = LegacyFirstBootState {
            otp: "12345678".to_string(),
            created_at: Timestamp::now(),
            used: false,
        };
        fsatomic::save_json(&path, &legacy, 0o600).unwrap();

        let store = FirstBootStore::new(&path, 900);
        assert!(store.verify("12345678").unwrap());
    }
}
