//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Configuration for a remote libSQL (Turso) database
#[derive(Clone, Default)]
pub struct RemoteConfig {
    /// Remote database URL (e.g., `libsql://your-db.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RemoteConfig {
    /// Create a new remote configuration
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
        }
    }

    /// Check if the remote is configured
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }
}

/// Database wrapper for libSQL connections
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self {
            _db: db,
            conn,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self {
            _db: db,
            conn,
        };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Connect directly to a remote libSQL database
    ///
    /// Every participant talks to the same remote, so reads always see the
    /// latest accepted write.
    pub async fn open_remote(config: RemoteConfig) -> Result<Self> {
        let url = config
            .url
            .ok_or_else(|| Error::InvalidInput("Remote URL is required".into()))?;
        let token = config
            .auth_token
            .ok_or_else(|| Error::InvalidInput("Auth token is required".into()))?;

        tracing::info!("Connecting to remote timer store: {url}");
        let db = Builder::new_remote(url, token).build().await?;
        let conn = db.connect()?;

        let database = Self {
            _db: db,
            conn,
        };
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for concurrent readers (local databases only)
    async fn configure(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok(); // In-memory databases keep their own journal mode
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA busy_timeout = 5000;", ())
            .await
            .ok();
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM timers", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_local_file_creates_schema() {
        let tmp = tempdir().unwrap();
        let db = Database::open(tmp.path().join("tandem.db")).await.unwrap();

        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM timers", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[test]
    fn test_remote_config_new() {
        let config = RemoteConfig::new("libsql://test.turso.io", "test-token");
        assert!(config.is_configured());
        assert_eq!(config.url, Some("libsql://test.turso.io".to_string()));
    }

    #[test]
    fn test_remote_config_debug_redacts_token() {
        let config = RemoteConfig::new("libsql://test.turso.io", "secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_remote_config_default_not_configured() {
        assert!(!RemoteConfig::default().is_configured());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_remote_requires_url_and_token() {
        let missing_token = RemoteConfig {
            url: Some("libsql://test.turso.io".to_string()),
            auth_token: None,
        };
        assert!(matches!(
            Database::open_remote(missing_token).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
