//! Plan-building business logic for the four stateful domains nosd owns:
//! pools, shares, firewall, and updates. Each module owns its own
//! fsatomic-backed store plus a set of pure `plan_*` functions that turn a
//! validated intent into a `txengine::Plan`, and `apply_*` functions that
//! persist the intended state and hand the plan to the engine.
//!
//! None of these modules touch the agent directly; they only ever describe
//! work for `txengine::Engine` to carry out.

pub mod firewall;
pub mod pool;
pub mod share;
pub mod updates;

use shared::error::ErrorCode;

/// Error type shared by every workflow module. `Validation` carries a
/// `validate::ValidationError` through unchanged; `Conflict` is for
/// business-rule rejections that aren't field-level validation (name
/// already taken, firewall already pending confirmation, tx engine busy).
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] validate::ValidationError),
    #[error("{message}")]
    Conflict { code: ErrorCode, message: String },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict { code, message: message.into() }
    }
}

impl From<txengine::EngineError> for WorkflowError {
    fn from(err: txengine::EngineError) -> Self {
        match err {
            txengine::EngineError::Busy(msg) => WorkflowError::conflict(ErrorCode::TxBusy, msg),
            other => WorkflowError::Internal(other.into()),
        }
    }
}

pub(crate) fn to_args<T: serde::Serialize>(value: T) -> Result<serde_json::Value, WorkflowError> {
    serde_json::to_value(value).map_err(|e| WorkflowError::Internal(e.into()))
}
