//! Sync engine timing configuration.
//!
//! Provides a `SyncSettings` struct shared by the CLI and embedders to tune
//! the echo fallback window, reconnect backoff, sweep cadence, and display
//! tick. Every field has a default, so an empty JSON object is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_ECHO_FALLBACK_MS: u64 = 2_000;
const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 3_000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 30_000;
const DEFAULT_STALE_AFTER_MS: u64 = 60_000;
const DEFAULT_DISPLAY_TICK_MS: u64 = 50;
const DEFAULT_CHANGE_FEED_POLL_MS: u64 = 500;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 10_000;

/// Timing knobs of the sync engine, all in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct SyncSettings {
    /// How long after a successful write to wait for its echo before
    /// force-clearing the syncing state
    pub echo_fallback_ms: u64,
    /// Delay between push channel reconnect attempts
    pub reconnect_backoff_ms: u64,
    /// Upper bound on a single subscribe attempt
    pub connect_timeout_ms: u64,
    /// Period of the reconciliation sweep
    pub sweep_interval_ms: u64,
    /// A running timer not confirmed for this long is re-fetched
    pub stale_after_ms: u64,
    /// Display clock tick while running
    pub display_tick_ms: u64,
    /// Poll period of polling-based change feeds
    pub change_feed_poll_ms: u64,
    /// Upper bound on a single remote write; a write that takes longer
    /// is treated as failed
    pub write_timeout_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            echo_fallback_ms: DEFAULT_ECHO_FALLBACK_MS,
            reconnect_backoff_ms: DEFAULT_RECONNECT_BACKOFF_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            display_tick_ms: DEFAULT_DISPLAY_TICK_MS,
            change_feed_poll_ms: DEFAULT_CHANGE_FEED_POLL_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl SyncSettings {
    /// Parse settings from a JSON document and validate them.
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Apply `TANDEM_*` environment overrides on top of these settings.
    ///
    /// Recognized keys: `TANDEM_ECHO_FALLBACK_MS`, `TANDEM_RECONNECT_BACKOFF_MS`,
    /// `TANDEM_CONNECT_TIMEOUT_MS`, `TANDEM_SWEEP_INTERVAL_MS`,
    /// `TANDEM_STALE_AFTER_MS`, `TANDEM_DISPLAY_TICK_MS`,
    /// `TANDEM_CHANGE_FEED_POLL_MS`, `TANDEM_WRITE_TIMEOUT_MS`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup instead of the process
    /// environment.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let fields: [(&str, &mut u64); 8] = [
            ("TANDEM_ECHO_FALLBACK_MS", &mut self.echo_fallback_ms),
            ("TANDEM_RECONNECT_BACKOFF_MS", &mut self.reconnect_backoff_ms),
            ("TANDEM_CONNECT_TIMEOUT_MS", &mut self.connect_timeout_ms),
            ("TANDEM_SWEEP_INTERVAL_MS", &mut self.sweep_interval_ms),
            ("TANDEM_STALE_AFTER_MS", &mut self.stale_after_ms),
            ("TANDEM_DISPLAY_TICK_MS", &mut self.display_tick_ms),
            ("TANDEM_CHANGE_FEED_POLL_MS", &mut self.change_feed_poll_ms),
            ("TANDEM_WRITE_TIMEOUT_MS", &mut self.write_timeout_ms),
        ];

        for (key, slot) in fields {
            let Some(raw) = lookup(key) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            *slot = raw.parse().map_err(|error| {
                Error::InvalidInput(format!("{key} must be a millisecond count: {error}"))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("echo_fallback_ms", self.echo_fallback_ms),
            ("reconnect_backoff_ms", self.reconnect_backoff_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("stale_after_ms", self.stale_after_ms),
            ("display_tick_ms", self.display_tick_ms),
            ("change_feed_poll_ms", self.change_feed_poll_ms),
            ("write_timeout_ms", self.write_timeout_ms),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidInput(format!("{field} must be greater than zero")));
        }
        if self.stale_after_ms < self.sweep_interval_ms {
            return Err(Error::InvalidInput(format!(
                "stale_after_ms ({}) must not be shorter than sweep_interval_ms ({})",
                self.stale_after_ms, self.sweep_interval_ms
            )));
        }
        Ok(())
    }

    pub const fn echo_fallback(&self) -> Duration {
        Duration::from_millis(self.echo_fallback_ms)
    }

    pub const fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub const fn display_tick(&self) -> Duration {
        Duration::from_millis(self.display_tick_ms)
    }

    pub const fn change_feed_poll(&self) -> Duration {
        Duration::from_millis(self.change_feed_poll_ms)
    }

    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn empty_json_yields_defaults() {
        let settings = SyncSettings::from_json("{}").unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.echo_fallback(), Duration::from_secs(2));
    }

    #[test]
    fn from_json_rejects_unknown_fields() {
        let error = SyncSettings::from_json(r#"{"echo_fallback_ms": 1000, "retries": 3}"#)
            .unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn validate_rejects_zero_and_short_staleness() {
        let zero = SyncSettings {
            display_tick_ms: 0,
            ..SyncSettings::default()
        };
        assert!(zero.validate().is_err());

        let short = SyncSettings {
            sweep_interval_ms: 30_000,
            stale_after_ms: 10_000,
            ..SyncSettings::default()
        };
        assert!(short.validate().unwrap_err().to_string().contains("stale_after_ms"));
    }

    #[test]
    fn overrides_replace_selected_fields() {
        let env = HashMap::from([
            ("TANDEM_ECHO_FALLBACK_MS", "1500"),
            ("TANDEM_DISPLAY_TICK_MS", " 20 "),
            ("TANDEM_SWEEP_INTERVAL_MS", ""),
        ]);
        let settings = SyncSettings::default()
            .with_overrides(|key| env.get(key).map(|value| (*value).to_string()))
            .unwrap();
        assert_eq!(settings.echo_fallback_ms, 1_500);
        assert_eq!(settings.display_tick_ms, 20);
        assert_eq!(settings.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
    }

    #[test]
    fn overrides_reject_garbage() {
        let error = SyncSettings::default()
            .with_overrides(|key| (key == "TANDEM_STALE_AFTER_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(error.to_string().contains("TANDEM_STALE_AFTER_MS"));
    }

    #[test]
    fn load_from_missing_path_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SyncSettings::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, SyncSettings::default());
    }
}
