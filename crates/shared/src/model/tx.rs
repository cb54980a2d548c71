use agentproto::AgentOp;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Ok,
    Error,
}

/// A step's compensation, persisted alongside it so a crash between the
/// step completing and its transaction finishing can still be undone on
/// the next restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCompensation {
    pub name: String,
    pub op: AgentOp,
    pub args: serde_json::Value,
}

/// One step of a `Tx`. `cmd` is an opaque label (the agent op name plus a
/// short argument summary), never the literal shell command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxStep {
    pub id: u32,
    pub name: String,
    pub cmd: String,
    pub destructive: bool,
    pub status: StepStatus,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    pub err: Option<String>,
    #[serde(default)]
    pub compensation: Option<PersistedCompensation>,
}

impl TxStep {
    pub fn new(id: u32, name: impl Into<String>, cmd: impl Into<String>, destructive: bool) -> Self {
        Self {
            id,
            name: name.into(),
            cmd: cmd.into(),
            destructive,
            status: StepStatus::Pending,
            started_at: None,
            finished_at: None,
            err: None,
            compensation: None,
        }
    }

    pub fn with_compensation(mut self, compensation: PersistedCompensation) -> Self {
        self.compensation = Some(compensation);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    pub id: Uuid,
    pub domain: String,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub ok: Option<bool>,
    pub error: Option<String>,
    pub steps: Vec<TxStep>,
}

impl Tx {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
