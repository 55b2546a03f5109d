mod backend;
mod file;
mod sqlite;

pub use backend::SessionStore;
pub use file::FileStorage;
pub use sqlite::SqliteStorage;

use chrono::NaiveDate;

use crate::config::DiaristConfig;
use crate::error::{DiaristError, Result};
use crate::model::Session;

/// Enum wrapper for storage backends. Dispatches to the concrete implementation.
/// Using an enum instead of `Box<dyn SessionStore>` because the trait uses RPITIT.
pub enum Storage {
    File(FileStorage),
    Sqlite(SqliteStorage),
}

impl SessionStore for Storage {
    async fn save(&self, session: &Session) -> Result<()> {
        match self {
            Storage::File(s) => s.save(session).await,
            Storage::Sqlite(s) => s.save(session).await,
        }
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<Session>> {
        match self {
            Storage::File(s) => s.load(date).await,
            Storage::Sqlite(s) => s.load(date).await,
        }
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        match self {
            Storage::File(s) => s.exists(date).await,
            Storage::Sqlite(s) => s.exists(date).await,
        }
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        match self {
            Storage::File(s) => s.list_dates().await,
            Storage::Sqlite(s) => s.list_dates().await,
        }
    }
}

impl Storage {
    /// Short backend name, as written in `[storage] backend`.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::File(_) => "file",
            Storage::Sqlite(_) => "sqlite",
        }
    }

    /// Directory (file backend) or database file (sqlite backend).
    pub fn location(&self) -> &std::path::Path {
        match self {
            Storage::File(s) => s.dir(),
            Storage::Sqlite(s) => s.path(),
        }
    }
}

/// Create a storage backend from the given configuration.
pub fn create_backend(config: &DiaristConfig) -> Result<Storage> {
    match config.storage.backend.as_str() {
        "file" => Ok(Storage::File(FileStorage::new(config.storage_path()?))),
        "sqlite" => {
            let storage = SqliteStorage::open(config.storage_path()?)?;
            Ok(Storage::Sqlite(storage))
        }
        other => Err(DiaristError::Config(format!(
            "unknown storage backend: {other}"
        ))),
    }
}
