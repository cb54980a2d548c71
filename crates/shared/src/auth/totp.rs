use anyhow::{Context, Result};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::konst::{TOTP_DIGITS, TOTP_ISSUER, TOTP_PERIOD_SECS, TOTP_SKEW_STEPS};

/// Generates a new base32-encoded TOTP secret.
pub fn generate_secret() -> String {
    match Secret::generate_secret().to_encoded() {
        Secret::Encoded(s) => s,
        Secret::Raw(_) => unreachable!("Secret::to_encoded always returns Encoded"),
    }
}

fn build(secret_b32: &str, account: &str) -> Result<TOTP> {
    let secret = Secret::Encoded(secret_b32.to_string())
        .to_bytes()
        .map_err(|e| anyhow::anyhow!("invalid TOTP secret encoding: {e:?}"))?;
    TOTP::new(
        Algorithm::SHA1,
        TOTP_DIGITS,
        TOTP_SKEW_STEPS,
        TOTP_PERIOD_SECS,
        secret,
        Some(TOTP_ISSUER.to_string()),
        account.to_string(),
    )
    .context("constructing TOTP instance")
}

/// `otpauth://` URL for QR enrollment; rendering the QR image is the UI's job.
pub fn otpauth_url(secret_b32: &str, account: &str) -> Result<String> {
    Ok(build(secret_b32, account)?.get_url())
}

/// Verifies `code` against `secret_b32` at the current time, honoring the
/// configured skew window.
pub fn verify_code(secret_b32: &str, account: &str, code: &str) -> Result<bool> {
    let totp = build(secret_b32, account)?;
    totp.check_current(code).context("checking TOTP code")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_verifies_against_itself() {
        let secret = generate_secret();
        let totp = build(&secret, "alice@example.com").unwrap();
        let code = totp.generate_current().unwrap();
        assert!(verify_code(&secret, "alice@example.com", &code).unwrap());
    }

    #[test]
    fn wrong_code_fails() {
        let secret = generate_secret();
        assert!(!verify_code(&secret, "alice@example.com", "000000").unwrap());
    }

    #[test]
    fn otpauth_url_contains_issuer() {
        let secret = generate_secret();
        let url = otpauth_url(&secret, "alice@example.com").unwrap();
        assert!(url.contains("NithronOS"));
    }
}
