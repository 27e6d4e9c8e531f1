//! libSQL-backed remote store for Tandem

mod change_feed;
mod connection;
mod migrations;
mod timer_repository;

pub use change_feed::LibSqlChangeFeed;
pub use connection::{Database, RemoteConfig};
pub use timer_repository::LibSqlTimerStore;
