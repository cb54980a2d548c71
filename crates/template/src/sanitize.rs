use anyhow::{Result, bail};

/// Rejects backslash/quote/newline in any field interpolated into a rendered
/// config file, so a crafted share name or description can't break out of
/// its quoted context in smb.conf/exports/nftables.
pub fn assert_safe_field(field: &str, value: &str) -> Result<()> {
    if value.contains(['\\', '"', '\'', '\n', '\r']) {
        bail!("{field} contains disallowed characters (backslash, quote, or newline): {value:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_text() {
        assert!(assert_safe_field("comment", "Family photos").is_ok());
    }

    #[test]
    fn rejects_backslash() {
        assert!(assert_safe_field("comment", "a\\b").is_err());
    }

    #[test]
    fn rejects_quote() {
        assert!(assert_safe_field("comment", "a\"b").is_err());
    }

    #[test]
    fn rejects_newline() {
        assert!(assert_safe_field("comment", "a\nb").is_err());
    }
}
