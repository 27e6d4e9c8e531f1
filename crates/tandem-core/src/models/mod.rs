//! Data models for Tandem

mod session;
mod timer;
mod token;

pub use session::SessionId;
pub use timer::{ChangeEvent, ChangeKind, TimerFields, TimerPatch, TimerRecord};
pub use token::OperationToken;
