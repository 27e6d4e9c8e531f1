pub mod common;
pub mod reset;
pub mod status;
pub mod toggle;
pub mod watch;
