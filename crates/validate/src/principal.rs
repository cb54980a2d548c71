use shared::error::ErrorCode;
use shared::model::Principal;

use crate::ValidationError;

fn valid_charset(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

/// Parses and validates `user:<name>` / `group:<name>` syntax with a
/// restricted name charset.
pub fn validate_principal(s: &str) -> Result<Principal, ValidationError> {
    let principal = Principal::parse(s).ok_or_else(|| {
        ValidationError::new(
            ErrorCode::ValidationPrincipalInvalid,
            format!("{s:?} is not of the form user:<name> or group:<name>"),
        )
    })?;

    let name = match &principal {
        Principal::User { name } | Principal::Group { name } => name,
    };
    if !valid_charset(name) {
        return Err(ValidationError::new(
            ErrorCode::ValidationPrincipalInvalid,
            format!("principal name {name:?} contains disallowed characters"),
        ));
    }
    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_user_principal() {
        assert!(validate_principal("user:alice").is_ok());
    }

    #[test]
    fn accepts_group_principal() {
        assert!(validate_principal("group:admins").is_ok());
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(validate_principal("role:admin").is_err());
    }

    #[test]
    fn rejects_bad_charset() {
        assert!(validate_principal("user:al ice").is_err());
        assert!(validate_principal("user:al/ice").is_err());
    }
}
