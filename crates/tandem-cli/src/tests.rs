use std::path::PathBuf;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tandem_core::db::Database;
use tandem_core::{SessionId, SyncSettings, TimerSnapshot};

use crate::commands::common::{
    attach_to_database, format_elapsed, format_status_lines, open_database, remote_config_from,
    resolve_db_path, resolve_settings, status_item_from_snapshot,
};
use crate::commands::watch::watch_line;
use crate::error::CliError;

fn fast_settings() -> SyncSettings {
    SyncSettings {
        echo_fallback_ms: 500,
        reconnect_backoff_ms: 50,
        connect_timeout_ms: 1_000,
        sweep_interval_ms: 100,
        stale_after_ms: 1_000,
        display_tick_ms: 10,
        change_feed_poll_ms: 10,
        write_timeout_ms: 1_000,
    }
}

#[test]
fn format_elapsed_zero_pads_every_field() {
    assert_eq!(format_elapsed(0), "00:00:00.00");
    assert_eq!(format_elapsed(1_009), "00:00:01.00");
    assert_eq!(format_elapsed(61_230), "00:01:01.23");
    assert_eq!(format_elapsed(3_600_000 + 59 * 60_000 + 59_990), "01:59:59.99");
}

#[test]
fn format_elapsed_keeps_counting_past_a_day() {
    assert_eq!(format_elapsed(100 * 3_600_000), "100:00:00.00");
}

#[test]
fn explicit_db_path_wins() {
    let path = PathBuf::from("/tmp/custom-tandem.db");
    assert_eq!(resolve_db_path(Some(path.clone())), path);
}

#[test]
fn remote_config_requires_both_values() {
    let none = remote_config_from(|_| None).unwrap();
    assert!(none.is_none());

    let both = remote_config_from(|key| match key {
        "TANDEM_DATABASE_URL" => Some("libsql://team.turso.io".to_string()),
        "TANDEM_AUTH_TOKEN" => Some("token".to_string()),
        _ => None,
    })
    .unwrap()
    .unwrap();
    assert!(both.is_configured());

    let half = remote_config_from(|key| {
        (key == "TANDEM_DATABASE_URL").then(|| "libsql://team.turso.io".to_string())
    });
    assert!(matches!(half, Err(CliError::Config(_))));
}

#[test]
fn blank_remote_values_are_ignored() {
    let blank = remote_config_from(|_| Some("   ".to_string())).unwrap();
    assert!(blank.is_none());
}

#[test]
fn settings_file_is_loaded() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tandem.json");
    std::fs::write(&path, r#"{ "echo_fallback_ms": 1500 }"#).unwrap();

    let settings = resolve_settings(Some(&path)).unwrap();
    assert_eq!(settings.echo_fallback_ms, 1_500);
    assert_eq!(
        settings.sweep_interval_ms,
        SyncSettings::default().sweep_interval_ms
    );
}

#[test]
fn unknown_settings_keys_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tandem.json");
    std::fs::write(&path, r#"{ "echo_fallback": 1500 }"#).unwrap();

    assert!(resolve_settings(Some(&path)).is_err());
}

#[test]
fn status_lines_show_state_and_warning() {
    let mut snapshot = TimerSnapshot::default();
    snapshot.fields.is_running = true;
    snapshot.fields.start_time = Some(1_000);
    snapshot.sync_in_progress = true;
    snapshot.last_warning = Some("Failed to save timer change".to_string());
    let session = SessionId::new("standup").unwrap();

    let item = status_item_from_snapshot(&session, &snapshot, 83_450);
    assert_eq!(item.display_time, "00:01:23.45");
    assert_eq!(
        format_status_lines(&item),
        vec![
            "standup  00:01:23.45  [running]".to_string(),
            "  syncing...".to_string(),
            "  warning: Failed to save timer change".to_string(),
        ]
    );
}

#[test]
fn status_item_serializes_connection_state() {
    let snapshot = TimerSnapshot::default();
    let session = SessionId::new("standup").unwrap();
    let item = status_item_from_snapshot(&session, &snapshot, 0);

    let json = serde_json::to_value(&item).unwrap();
    assert_eq!(json["connection"], "disconnected");
    assert_eq!(json["display_time"], "00:00:00.00");
    assert_eq!(json["is_running"], false);
}

#[test]
fn watch_line_pads_state() {
    assert_eq!(watch_line(1_500, true), "00:00:01.50  [running]");
    assert_eq!(watch_line(1_500, false), "00:00:01.50  [paused ]");
}

#[tokio::test(flavor = "multi_thread")]
async fn open_database_creates_parent_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("tandem.db");

    open_database(&path, None).await.unwrap();
    assert!(path.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn two_clients_share_a_local_database() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tandem.db");
    let session = SessionId::new("pairing").unwrap();

    let first = attach_to_database(
        session.clone(),
        Database::open(&path).await.unwrap(),
        fast_settings(),
    )
    .await
    .unwrap();
    let second = attach_to_database(
        session,
        Database::open(&path).await.unwrap(),
        fast_settings(),
    )
    .await
    .unwrap();

    assert!(first.toggle().await.unwrap().is_applied());
    first.wait_until_synced().await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while !second.is_running() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("second client did not see the start");

    assert_eq!(
        second.snapshot().fields.start_time,
        first.snapshot().fields.start_time
    );
    first.close().await;
    second.close().await;
}
