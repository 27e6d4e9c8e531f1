//! Timer record repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Row, Value};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{SessionId, TimerPatch, TimerRecord};
use crate::remote::RecordStore;
use crate::util::{ms_to_i64, non_negative_ms};

const SELECT_TIMER: &str = "SELECT session_id, is_running, start_time, accumulated_time, updated_at
     FROM timers
     WHERE session_id = ?";

/// libSQL implementation of [`RecordStore`]
///
/// Clones share the same connection.
#[derive(Clone)]
pub struct LibSqlTimerStore {
    db: Arc<Database>,
}

impl LibSqlTimerStore {
    /// Create a new store backed by the given database
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Parse a timer record from a database row
    fn parse_timer(row: &Row) -> Result<TimerRecord> {
        let session_id: String = row.get(0)?;
        let start_time = match row.get_value(2)? {
            Value::Null => None,
            Value::Integer(value) => Some(value),
            other => {
                return Err(Error::Database(format!(
                    "Unexpected start_time value: {other:?}"
                )))
            }
        };

        Ok(TimerRecord {
            session_id: SessionId::new(session_id)?,
            is_running: row.get::<i64>(1)? != 0,
            start_time,
            accumulated_time: non_negative_ms(row.get::<i64>(3)?),
            updated_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl RecordStore for LibSqlTimerStore {
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<TimerRecord>> {
        let mut rows = self
            .db
            .connection()
            .query(SELECT_TIMER, [session_id.as_str()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_timer(&row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_or_create(&self, session_id: &SessionId, now_ms: i64) -> Result<TimerRecord> {
        self.db
            .connection()
            .execute(
                "INSERT INTO timers (session_id, is_running, start_time, accumulated_time, updated_at)
                 VALUES (?, 0, NULL, 0, ?)
                 ON CONFLICT(session_id) DO NOTHING",
                libsql::params![session_id.as_str(), now_ms],
            )
            .await?;

        self.fetch(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))
    }

    async fn update(
        &self,
        session_id: &SessionId,
        patch: &TimerPatch,
        updated_at: i64,
    ) -> Result<TimerRecord> {
        let start_time = patch.start_time.map_or(Value::Null, Value::Integer);
        let accumulated_time = patch
            .accumulated_time
            .map_or(Value::Null, |value| Value::Integer(ms_to_i64(value)));

        // Upsert so a command against a missing row still lands; `?4` left
        // NULL keeps the stored accumulated time.
        self.db
            .connection()
            .execute(
                "INSERT INTO timers (session_id, is_running, start_time, accumulated_time, updated_at)
                 VALUES (?1, ?2, ?3, COALESCE(?4, 0), ?5)
                 ON CONFLICT(session_id) DO UPDATE SET
                     is_running = excluded.is_running,
                     start_time = excluded.start_time,
                     accumulated_time = COALESCE(?4, timers.accumulated_time),
                     updated_at = excluded.updated_at",
                libsql::params![
                    session_id.as_str(),
                    i64::from(patch.is_running),
                    start_time,
                    accumulated_time,
                    updated_at
                ],
            )
            .await?;

        self.fetch(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))
    }
}
