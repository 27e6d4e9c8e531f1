//! Timer record model

use serde::{Deserialize, Serialize};

use super::SessionId;
use crate::util::non_negative_ms;

/// The three timer fields every participant mirrors.
///
/// `start_time` is set exactly when `is_running` is; values built through
/// [`TimerPatch`] or [`TimerFields::normalized`] keep that pairing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerFields {
    /// Whether the current run segment is open
    pub is_running: bool,
    /// Start of the current run segment (Unix ms)
    pub start_time: Option<i64>,
    /// Elapsed run time excluding the current segment (ms)
    pub accumulated_time: u64,
}

impl TimerFields {
    /// A stopped timer with nothing accumulated.
    pub const fn stopped() -> Self {
        Self {
            is_running: false,
            start_time: None,
            accumulated_time: 0,
        }
    }

    /// Elapsed time to show at `now_ms`.
    ///
    /// Derived from absolute timestamps, so it self-corrects after the
    /// process was suspended. A start time in the future counts as zero.
    pub fn display_time(&self, now_ms: i64) -> u64 {
        match (self.is_running, self.start_time) {
            (true, Some(start)) => self
                .accumulated_time
                .saturating_add(non_negative_ms(now_ms.saturating_sub(start))),
            _ => self.accumulated_time,
        }
    }

    /// Whether `is_running` and `start_time` agree.
    pub const fn is_consistent(&self) -> bool {
        self.is_running == self.start_time.is_some()
    }

    /// Repair a payload whose running flag and start time disagree.
    ///
    /// Running without a start time cannot be displayed, so it becomes
    /// paused; a paused payload drops its stray start time.
    #[must_use]
    pub const fn normalized(self) -> Self {
        if self.is_running && self.start_time.is_some() {
            self
        } else {
            Self {
                is_running: false,
                start_time: None,
                accumulated_time: self.accumulated_time,
            }
        }
    }
}

/// Stored/wire shape of the one timer row per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Owning session
    pub session_id: SessionId,
    /// Whether the timer is currently running
    pub is_running: bool,
    /// Start of the current run segment (Unix ms)
    pub start_time: Option<i64>,
    /// Elapsed run time excluding the current segment (ms)
    pub accumulated_time: u64,
    /// Last remote write (Unix ms); observability only
    pub updated_at: i64,
}

impl TimerRecord {
    /// A freshly created, stopped record.
    pub const fn new(session_id: SessionId, now_ms: i64) -> Self {
        Self {
            session_id,
            is_running: false,
            start_time: None,
            accumulated_time: 0,
            updated_at: now_ms,
        }
    }

    /// The mirrored timer fields of this record.
    pub const fn fields(&self) -> TimerFields {
        TimerFields {
            is_running: self.is_running,
            start_time: self.start_time,
            accumulated_time: self.accumulated_time,
        }
    }

    /// Apply a partial update, stamping `updated_at`.
    pub fn apply_patch(&mut self, patch: &TimerPatch, updated_at: i64) {
        let fields = patch.apply_to(self.fields());
        self.is_running = fields.is_running;
        self.start_time = fields.start_time;
        self.accumulated_time = fields.accumulated_time;
        self.updated_at = updated_at;
    }
}

/// Partial update issued by a command.
///
/// `is_running` and `start_time` always travel together; leaving
/// `accumulated_time` as `None` keeps the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPatch {
    pub is_running: bool,
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accumulated_time: Option<u64>,
}

impl TimerPatch {
    /// Open a run segment at `start_ms`, keeping the accumulated time.
    pub const fn start(start_ms: i64) -> Self {
        Self {
            is_running: true,
            start_time: Some(start_ms),
            accumulated_time: None,
        }
    }

    /// Close the run segment, folding it into `accumulated_ms`.
    pub const fn pause(accumulated_ms: u64) -> Self {
        Self {
            is_running: false,
            start_time: None,
            accumulated_time: Some(accumulated_ms),
        }
    }

    /// Stop and zero the timer.
    pub const fn reset() -> Self {
        Self::pause(0)
    }

    /// The fields that result from applying this patch to `fields`.
    pub fn apply_to(&self, fields: TimerFields) -> TimerFields {
        TimerFields {
            is_running: self.is_running,
            start_time: self.start_time,
            accumulated_time: self.accumulated_time.unwrap_or(fields.accumulated_time),
        }
    }
}

/// Kind of row change reported by the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// One push-channel notification: the full record after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: TimerRecord,
}
