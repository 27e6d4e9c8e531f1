//! tandem-core - Core library for Tandem
//!
//! A stopwatch shared by every participant of a session. Each client keeps
//! a local mirror of the one timer record, applies its own commands
//! optimistically, and converges on the remote record through a push
//! channel, echo suppression and periodic reconciliation.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod state;
mod sync;
pub mod util;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{OperationToken, SessionId, TimerFields, TimerRecord};
pub use session::SharedTimer;
pub use state::{ConnectionState, SyncStats, TimerSnapshot};
pub use sync::{CommandOutcome, RejectReason};
