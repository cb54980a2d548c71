//! Entity types persisted across `nosd`'s JSON state files.
//!
//! Every type here is plain data: no entity holds a reference to another,
//! only an id. Persistence and locking live in `fsatomic` and `txengine`,
//! not here.

mod firewall;
mod firstboot;
mod pool;
mod session;
mod share;
mod snapshot;
mod tx;
mod update;
mod user;

pub use firewall::{FirewallMode, FirewallState, FirewallStatus};
pub use firstboot::{FirstBootState, LegacyFirstBootState};
pub use pool::{Pool, RaidProfile};
pub use session::Session;
pub use pool::estimate_capacity;
pub use share::{NfsConfig, Principal, Share, SmbConfig};
pub use snapshot::{SnapshotTarget, SnapshotType};
pub use tx::{PersistedCompensation, StepStatus, Tx, TxStep};
pub use update::UpdateTx;
pub use user::{Role, User};
