use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tandem_core::db::{Database, LibSqlChangeFeed, LibSqlTimerStore, RemoteConfig};
use tandem_core::util::normalize_text_option;
use tandem_core::{ConnectionState, SessionId, SharedTimer, SyncSettings, TimerSnapshot};

use crate::error::CliError;

const DATABASE_URL_ENV: &str = "TANDEM_DATABASE_URL";
const AUTH_TOKEN_ENV: &str = "TANDEM_AUTH_TOKEN";

#[derive(Debug, Serialize)]
pub struct TimerStatusItem {
    pub session_id: String,
    pub is_running: bool,
    pub display_time_ms: u64,
    pub display_time: String,
    pub accumulated_time_ms: u64,
    pub start_time: Option<i64>,
    pub syncing: bool,
    pub connection: ConnectionState,
    pub last_sync_at: Option<i64>,
    pub warning: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TANDEM_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
        .join("tandem.db")
}

/// Sync settings from an optional JSON file, then `TANDEM_*` overrides.
pub fn resolve_settings(config_path: Option<&Path>) -> Result<SyncSettings, CliError> {
    let settings = match config_path {
        Some(path) => SyncSettings::load_from_path(path)?,
        None => SyncSettings::default(),
    };
    Ok(settings.with_env_overrides()?)
}

/// Remote database settings from the environment, if any.
pub fn remote_config_from_env() -> Result<Option<RemoteConfig>, CliError> {
    remote_config_from(|key| env::var(key).ok())
}

pub fn remote_config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<RemoteConfig>, CliError> {
    let url = normalize_text_option(lookup(DATABASE_URL_ENV));
    let token = normalize_text_option(lookup(AUTH_TOKEN_ENV));

    match (url, token) {
        (Some(url), Some(token)) => Ok(Some(RemoteConfig::new(url, token))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(CliError::Config(format!(
            "{DATABASE_URL_ENV} is set but {AUTH_TOKEN_ENV} is missing"
        ))),
        (None, Some(_)) => Err(CliError::Config(format!(
            "{AUTH_TOKEN_ENV} is set but {DATABASE_URL_ENV} is missing"
        ))),
    }
}

pub async fn open_database(
    db_path: &Path,
    remote: Option<RemoteConfig>,
) -> Result<Database, CliError> {
    if let Some(config) = remote {
        return Ok(Database::open_remote(config).await?);
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(db_path).await?)
}

/// Attach to a session over the configured database.
pub async fn attach_timer(
    session: &str,
    db_path: &Path,
    settings: SyncSettings,
) -> Result<SharedTimer, CliError> {
    let session_id = SessionId::new(session)?;
    let db = open_database(db_path, remote_config_from_env()?).await?;
    attach_to_database(session_id, db, settings).await
}

pub async fn attach_to_database(
    session_id: SessionId,
    db: Database,
    settings: SyncSettings,
) -> Result<SharedTimer, CliError> {
    let store = LibSqlTimerStore::new(Arc::new(db));
    let feed = LibSqlChangeFeed::new(store.clone(), settings.change_feed_poll());
    Ok(SharedTimer::attach(session_id, Arc::new(store), Arc::new(feed), settings).await?)
}

pub fn timer_status_item(timer: &SharedTimer) -> TimerStatusItem {
    status_item_from_snapshot(timer.session_id(), &timer.snapshot(), timer.display_time())
}

pub fn status_item_from_snapshot(
    session_id: &SessionId,
    snapshot: &TimerSnapshot,
    display_time_ms: u64,
) -> TimerStatusItem {
    TimerStatusItem {
        session_id: session_id.to_string(),
        is_running: snapshot.fields.is_running,
        display_time_ms,
        display_time: format_elapsed(display_time_ms),
        accumulated_time_ms: snapshot.fields.accumulated_time,
        start_time: snapshot.fields.start_time,
        syncing: snapshot.sync_in_progress,
        connection: snapshot.connection,
        last_sync_at: snapshot.last_sync_at,
        warning: snapshot.last_warning.clone(),
    }
}

pub fn format_status_lines(item: &TimerStatusItem) -> Vec<String> {
    let state = if item.is_running { "running" } else { "paused" };
    let mut lines = vec![format!("{}  {}  [{state}]", item.session_id, item.display_time)];

    if item.syncing {
        lines.push("  syncing...".to_string());
    }
    if let Some(synced) = item.last_sync_at.and_then(format_sync_time) {
        lines.push(format!("  last synced {synced}"));
    }
    if let Some(warning) = &item.warning {
        lines.push(format!("  warning: {warning}"));
    }
    lines
}

pub fn print_status(item: &TimerStatusItem, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(item)?);
    } else {
        for line in format_status_lines(item) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Format elapsed milliseconds as `HH:MM:SS.cc`.
pub fn format_elapsed(ms: u64) -> String {
    let centis = (ms / 10) % 100;
    let total_seconds = ms / 1_000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3_600;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{centis:02}")
}

pub fn format_sync_time(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
}
