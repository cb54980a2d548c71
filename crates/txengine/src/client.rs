use agentproto::AgentOp;
use async_trait::async_trait;

/// Errors calling out to the agent. Distinct from `agentproto::AgentHttpError`
/// so the engine can also represent a transport-level timeout, which never
/// reaches the point of having an HTTP status to inspect.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentClientError {
    #[error("agent refused: {0}")]
    Refused(String),
    #[error("agent busy: {0}")]
    Busy(String),
    #[error("agent call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

impl AgentClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentClientError::Busy(_) | AgentClientError::Unavailable(_))
    }
}

impl From<agentproto::AgentHttpError> for AgentClientError {
    fn from(err: agentproto::AgentHttpError) -> Self {
        if err.is_retryable() {
            AgentClientError::Busy(err.body)
        } else {
            AgentClientError::Refused(err.body)
        }
    }
}

/// Abstracts the agent RPC so the engine is testable without a real unix
/// socket: tests supply a stub that records calls and returns canned
/// results.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn call(
        &self,
        op: AgentOp,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AgentClientError>;
}
