//! Wire protocol shared by `nosd` (client) and `agent` (server).
//!
//! `AgentOp` is the closed whitelist: a non-whitelisted path can never be
//! constructed client-side, because there is no variant for it. Each op's
//! argument shape is a separate typed struct so serialization round-trips
//! losslessly; `AgentRequest.args` carries it as `serde_json::Value` until
//! the dispatcher picks the op and deserializes into the matching struct.

mod args;
mod op;

pub use args::*;
pub use op::AgentOp;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub op: AgentOp,
    pub args: serde_json::Value,
}

/// One newline-delimited log line in a streaming response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub line: String,
}

/// Final line of a streaming response, always `{"done":true,...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalEnvelope {
    pub done: bool,
    pub exit_code: i32,
    pub error: Option<String>,
}

impl TerminalEnvelope {
    pub fn ok() -> Self {
        Self { done: true, exit_code: 0, error: None }
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self { done: true, exit_code, error: Some(error.into()) }
    }
}

/// A non-2xx response from the agent, surfaced to the caller typed so the
/// daemon can distinguish retryable (busy/conflict) from fatal (invalid
/// request) without parsing the body as a string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("agent returned {status}: {body}")]
pub struct AgentHttpError {
    pub status: u16,
    pub body: String,
}

impl AgentHttpError {
    pub fn is_retryable(&self) -> bool {
        matches!(self.status, 409 | 429 | 503)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(AgentHttpError { status: 409, body: String::new() }.is_retryable());
        assert!(AgentHttpError { status: 503, body: String::new() }.is_retryable());
        assert!(!AgentHttpError { status: 400, body: String::new() }.is_retryable());
    }
}
