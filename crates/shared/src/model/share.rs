use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// `user:<name>` or `group:<name>`, already validated (see `validate` crate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    User { name: String },
    Group { name: String },
}

impl Principal {
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, name) = s.split_once(':')?;
        match kind {
            "user" => Some(Principal::User { name: name.to_string() }),
            "group" => Some(Principal::Group { name: name.to_string() }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbConfig {
    pub enabled: bool,
    #[serde(default)]
    pub guest_ok: bool,
    #[serde(default)]
    pub time_machine: bool,
    #[serde(default)]
    pub recycle_bin: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsConfig {
    pub enabled: bool,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub smb: Option<SmbConfig>,
    #[serde(default)]
    pub nfs: Option<NfsConfig>,
    pub owners: Vec<Principal>,
    pub readers: Vec<Principal>,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Share {
    pub fn any_protocol_enabled(&self) -> bool {
        self.smb.as_ref().is_some_and(|s| s.enabled) || self.nfs.as_ref().is_some_and(|n| n.enabled)
    }

    pub fn is_time_machine(&self) -> bool {
        self.smb.as_ref().is_some_and(|s| s.time_machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_principal() {
        assert_eq!(
            Principal::parse("user:alice"),
            Some(Principal::User { name: "alice".into() })
        );
    }

    #[test]
    fn parses_group_principal() {
        assert_eq!(
            Principal::parse("group:admins"),
            Some(Principal::Group { name: "admins".into() })
        );
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(Principal::parse("role:admin"), None);
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(Principal::parse("alice"), None);
    }
}
