//! Transaction engine: plans declare an ordered sequence of agent
//! operations with compensations; `Engine` executes them per-domain,
//! persists every transition via `fsatomic`, and exposes pull (`log`) and
//! push (`stream`) progress reads.

mod client;
mod engine;
mod journal;
mod log;
mod plan;

pub use client::{AgentClient, AgentClientError};
pub use engine::{Engine, EngineError, TxEvent, TxStatus};
pub use journal::reconcile;
pub use log::LogPage;
pub use plan::{CompensatingAction, Plan, PlanStep};

pub use shared::model::tx::{PersistedCompensation, StepStatus, Tx, TxStep};
