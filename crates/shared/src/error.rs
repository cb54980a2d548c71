use serde::{Deserialize, Serialize};

/// Wire error codes shared between `nosd`'s HTTP responses and `nosctl`'s
/// response parsing, so the client can match on the same strings the
/// daemon emits instead of parsing free-text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    AuthInvalid,
    AuthTotpRequired,
    AuthLocked,
    AuthRateLimited,

    SetupOtpInvalid,
    SetupOtpExpired,
    SetupAlreadyComplete,

    ValidationShareNameInvalid,
    ValidationShareNameExists,
    ValidationSmbConfigInvalid,
    ValidationNfsExportFail,
    ValidationAclApplyFail,
    ValidationPoolLabelInvalid,
    ValidationPoolDeviceCount,
    ValidationPrincipalInvalid,

    TxBusy,
    TxNotFound,
    TxCancelled,
    TxStepFailed,

    FirewallPendingConfirm,
    FirewallRollbackRequired,
    FirewallDryRunFailed,

    AgentUnavailable,
    AgentRefused,
    AgentTimeout,

    Internal,
}

impl ErrorCode {
    /// The dotted wire form spec.md's taxonomy uses, e.g. `auth.invalid`.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ErrorCode::AuthInvalid => "auth.invalid",
            ErrorCode::AuthTotpRequired => "auth.totp-required",
            ErrorCode::AuthLocked => "auth.locked",
            ErrorCode::AuthRateLimited => "auth.rate-limited",
            ErrorCode::SetupOtpInvalid => "setup.otp-invalid",
            ErrorCode::SetupOtpExpired => "setup.otp-expired",
            ErrorCode::SetupAlreadyComplete => "setup.already-complete",
            ErrorCode::ValidationShareNameInvalid => "validation.share.name.invalid",
            ErrorCode::ValidationShareNameExists => "validation.share.name.exists",
            ErrorCode::ValidationSmbConfigInvalid => "validation.smb.config.invalid",
            ErrorCode::ValidationNfsExportFail => "validation.nfs.export.fail",
            ErrorCode::ValidationAclApplyFail => "validation.acl.apply.fail",
            ErrorCode::ValidationPoolLabelInvalid => "validation.pool.label.invalid",
            ErrorCode::ValidationPoolDeviceCount => "validation.pool.device-count.invalid",
            ErrorCode::ValidationPrincipalInvalid => "validation.principal.invalid",
            ErrorCode::TxBusy => "tx.busy",
            ErrorCode::TxNotFound => "tx.not-found",
            ErrorCode::TxCancelled => "tx.cancelled",
            ErrorCode::TxStepFailed => "tx.step-failed",
            ErrorCode::FirewallPendingConfirm => "firewall.pending-confirm",
            ErrorCode::FirewallRollbackRequired => "firewall.rollback-required",
            ErrorCode::FirewallDryRunFailed => "firewall.dry-run-failed",
            ErrorCode::AgentUnavailable => "agent.unavailable",
            ErrorCode::AgentRefused => "agent.refused",
            ErrorCode::AgentTimeout => "agent.timeout",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_str_matches_taxonomy() {
        assert_eq!(ErrorCode::AuthTotpRequired.as_wire_str(), "auth.totp-required");
        assert_eq!(ErrorCode::TxBusy.as_wire_str(), "tx.busy");
    }
}
