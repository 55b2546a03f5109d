use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::SessionStore;
use crate::error::{DiaristError, Result};
use crate::model::Session;

/// SQLite-backed storage for diary sessions.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks.  All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Open (or create) a file-backed SQLite database at `path`.
    ///
    /// Creates the parent directory if needed, sets WAL journal mode, then
    /// creates the table if it doesn't already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DiaristError::Persistence(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(&path).map_err(|e| {
            DiaristError::Persistence(format!("failed to open SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DiaristError::Persistence(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // WAL mode for better concurrent-read performance.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| DiaristError::Persistence(format!("failed to set WAL mode: {e}")))?;

        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        storage.create_tables()?;
        Ok(storage)
    }

    /// Create the sessions table (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| {
            DiaristError::Persistence(format!("failed to acquire database lock: {e}"))
        })?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS diary_sessions (
                date TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                entry_count INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| DiaristError::Persistence(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                DiaristError::Persistence(format!("failed to acquire database lock: {e}"))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| DiaristError::Persistence(format!("task join error: {e}")))?
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl SessionStore for SqliteStorage {
    async fn save(&self, session: &Session) -> Result<()> {
        let key = date_key(session.date());
        let payload = serde_json::to_string(session)?;
        let entry_count = session.entry_count() as i64;
        let active = session.is_active();
        let updated_at = chrono::Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO diary_sessions (date, payload, entry_count, active, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(date) DO UPDATE SET
                    payload = excluded.payload,
                    entry_count = excluded.entry_count,
                    active = excluded.active,
                    updated_at = excluded.updated_at",
                params![key, payload, entry_count, active, updated_at],
            )
            .map_err(|e| DiaristError::Persistence(format!("failed to save session: {e}")))?;
            Ok(())
        })
        .await?;

        tracing::info!(
            date = %session.date(),
            entries = session.entry_count(),
            "diary session saved"
        );
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<Session>> {
        let key = date_key(date);
        let payload: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT payload FROM diary_sessions WHERE date = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| DiaristError::Persistence(format!("failed to load session: {e}")))
            })
            .await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        let key = date_key(date);
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM diary_sessions WHERE date = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .map_err(|e| DiaristError::Persistence(e.to_string()))?;
            Ok(count > 0)
        })
        .await
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let keys: Vec<String> = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT date FROM diary_sessions ORDER BY date")
                    .map_err(|e| DiaristError::Persistence(e.to_string()))?;
                let rows = stmt
                    .query_map([], |row| row.get(0))
                    .map_err(|e| DiaristError::Persistence(e.to_string()))?
                    .collect::<std::result::Result<Vec<String>, _>>()
                    .map_err(|e| DiaristError::Persistence(e.to_string()))?;
                Ok(rows)
            })
            .await?;

        Ok(keys
            .iter()
            .filter_map(|k| match NaiveDate::parse_from_str(k, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!("skipping malformed session date '{k}': {e}");
                    None
                }
            })
            .collect())
    }
}
