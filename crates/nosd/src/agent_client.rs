use std::path::PathBuf;
use std::time::Duration;

use agentproto::AgentOp;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use hyperlocal::{UnixClientExt, UnixConnector, Uri as UnixUri};

use txengine::{AgentClient, AgentClientError};

const CALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Speaks the agent's unix-socket HTTP API on behalf of the transaction
/// engine. One `AgentRequest` per call; streaming ops are drained to
/// completion and their last terminal envelope is what decides success.
pub struct UnixSocketAgentClient {
    socket_path: PathBuf,
    client: Client<UnixConnector, Full<bytes::Bytes>>,
}

impl UnixSocketAgentClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            client: Client::unix(),
        }
    }

    fn uri(&self, path: &str) -> hyper::Uri {
        UnixUri::new(&self.socket_path, path).into()
    }
}

#[async_trait]
impl AgentClient for UnixSocketAgentClient {
    async fn call(
        &self,
        op: AgentOp,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AgentClientError> {
        let body = serde_json::to_vec(&agentproto::AgentRequest { op, args })
            .map_err(|err| AgentClientError::Refused(err.to_string()))?;

        let request = Request::post(self.uri(op.path()))
            .header("content-type", "application/json")
            .body(Full::new(bytes::Bytes::from(body)))
            .map_err(|err| AgentClientError::Refused(err.to_string()))?;

        let response = tokio::time::timeout(CALL_TIMEOUT, self.client.request(request))
            .await
            .map_err(|_| AgentClientError::Timeout(CALL_TIMEOUT))?
            .map_err(|err| AgentClientError::Unavailable(err.to_string()))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|err| AgentClientError::Unavailable(err.to_string()))?
            .to_bytes();

        if op.is_streaming() {
            return parse_ndjson_tail(status, &body);
        }

        if !status.is_success() {
            return Err(agentproto::AgentHttpError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }

        serde_json::from_slice(&body).map_err(|err| AgentClientError::Refused(err.to_string()))
    }
}

/// A streaming op's body is NDJSON log lines followed by one
/// `TerminalEnvelope`. The engine only needs the final outcome; per-line
/// progress is surfaced separately once `txengine` grows a live-tail path.
fn parse_ndjson_tail(
    status: hyper::StatusCode,
    body: &[u8],
) -> Result<serde_json::Value, AgentClientError> {
    if !status.is_success() {
        return Err(agentproto::AgentHttpError {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
        .into());
    }

    let text = String::from_utf8_lossy(body);
    let last_line = text.lines().last().unwrap_or_default();
    let envelope: agentproto::TerminalEnvelope = serde_json::from_str(last_line)
        .map_err(|err| AgentClientError::Refused(err.to_string()))?;

    if envelope.exit_code == 0 {
        Ok(serde_json::json!({}))
    } else {
        Err(AgentClientError::Refused(
            envelope.error.unwrap_or_else(|| "op failed".to_string()),
        ))
    }
}
