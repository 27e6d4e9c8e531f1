//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Current Unix timestamp in milliseconds.
pub fn unix_timestamp_ms_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Convert a stored millisecond count into `u64`, clamping negatives to zero.
pub fn non_negative_ms(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Convert a millisecond count into the `i64` SQLite stores, saturating.
pub fn ms_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
