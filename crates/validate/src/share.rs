use shared::error::ErrorCode;

use crate::ValidationError;

/// `^[a-z0-9][a-z0-9-_]{1,31}$`
pub fn validate_share_name(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(first) => first.is_ascii_lowercase() || first.is_ascii_digit(),
        None => false,
    } && name.len() <= 32
        && name.len() >= 2
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(
            ErrorCode::ValidationShareNameInvalid,
            format!("share name {name:?} must match ^[a-z0-9][a-z0-9-_]{{1,31}}$"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_name() {
        assert!(validate_share_name("docs").is_ok());
        assert!(validate_share_name("photos-2024").is_ok());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(validate_share_name("Docs").is_err());
    }

    #[test]
    fn rejects_spaces() {
        assert!(validate_share_name("my docs").is_err());
    }

    #[test]
    fn rejects_leading_hyphen() {
        assert!(validate_share_name("-docs").is_err());
    }

    #[test]
    fn rejects_leading_underscore() {
        assert!(validate_share_name("_docs").is_err());
    }

    #[test]
    fn rejects_single_char() {
        assert!(validate_share_name("d").is_err());
    }

    #[test]
    fn rejects_over_length() {
        assert!(validate_share_name(&"a".repeat(33)).is_err());
    }
}
