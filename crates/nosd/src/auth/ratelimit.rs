use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use jiff::Timestamp;

/// In-memory sliding-window limiter keyed by `(ip, endpoint)`. Never
/// persisted: a daemon restart resets everyone's budget, which is
/// acceptable since the lockout counters in `UserStore` are the durable
/// backstop against credential stuffing.
pub struct RateLimiter {
    max_attempts: u32,
    window_secs: i64,
    buckets: Mutex<HashMap<(IpAddr, &'static str), Bucket>>,
}

struct Bucket {
    count: u32,
    window_start: Timestamp,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window_secs: i64) -> Self {
        Self {
            max_attempts,
            window_secs,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Records one attempt and reports whether the caller is over budget. On
    /// rejection, returns the number of seconds until the window resets so
    /// the caller can set a `Retry-After` header.
    pub fn check(&self, ip: IpAddr, endpoint: &'static str) -> Result<(), u64> {
        let now = Timestamp::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry((ip, endpoint)).or_insert_with(|| Bucket {
            count: 0,
            window_start: now,
        });

        let elapsed = now
            .since(bucket.window_start)
            .map(|span| span.get_seconds())
            .unwrap_or(self.window_secs);

        if elapsed >= self.window_secs {
            bucket.count = 0;
            bucket.window_start = now;
        }

        bucket.count += 1;

        if bucket.count > self.max_attempts {
            let retry_after = (self.window_secs - elapsed).max(1) as u64;
            return Err(retry_after);
        }

        Ok(())
    }

    /// Clears the bucket for `ip`/`endpoint`, used after a successful login
    /// so a legitimate user isn't penalized by their own earlier typos.
    pub fn reset(&self, ip: IpAddr, endpoint: &'static str) {
        self.buckets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(ip, endpoint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn allows_up_to_max_attempts() {
        let limiter = RateLimiter::new(3, 60);
        let ip = IpAddr::from_str("10.0.0.1").unwrap();
        for _ in 0..3 {
            assert!(limiter.check(ip, "login").is_ok());
        }
        assert!(limiter.check(ip, "login").is_err());
    }

    #[test]
    fn buckets_are_independent_per_endpoint() {
        let limiter = RateLimiter::new(1, 60);
        let ip = IpAddr::from_str("10.0.0.2").unwrap();
        assert!(limiter.check(ip, "login").is_ok());
        assert!(limiter.check(ip, "otp").is_ok());
    }

    #[test]
    fn reset_clears_the_bucket() {
        let limiter = RateLimiter::new(1, 60);
        let ip = IpAddr::from_str("10.0.0.3").unwrap();
        assert!(limiter.check(ip, "login").is_ok());
        assert!(limiter.check(ip, "login").is_err());
        limiter.reset(ip, "login");
        assert!(limiter.check(ip, "login").is_ok());
    }
}
