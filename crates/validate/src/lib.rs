//! Field-level validators for the entities in `shared::model`.
//!
//! Each validator returns the `validation.*` wire error family so the HTTP
//! layer can surface it unchanged, per the error propagation rule: validation
//! errors are never wrapped or translated, they reach the caller as-is.

mod pool;
mod principal;
mod share;

pub use pool::{validate_pool_label, validate_raid_device_count};
pub use principal::validate_principal;
pub use share::validate_share_name;

use shared::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: String,
}

impl ValidationError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}
