//! Operation token model

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Marker correlating a locally issued mutation with its eventual echo.
///
/// Uses UUID v7, so tokens issued later sort after earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationToken(Uuid);

impl OperationToken {
    /// Create a new unique token using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this token
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for OperationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_unique() {
        let a = OperationToken::new();
        let b = OperationToken::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokens_are_time_ordered() {
        let earlier = OperationToken::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let later = OperationToken::new();
        assert!(later > earlier);
    }
}
