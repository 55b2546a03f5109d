use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::SessionStore;
use crate::error::{DiaristError, Result};
use crate::model::Session;

const FILE_PREFIX: &str = "diary_";
const FILE_SUFFIX: &str = ".json";

/// One pretty-printed JSON document per day: `<dir>/diary_YYYY-MM-DD.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding `date`'s session.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(file_name(date))
    }
}

fn file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_SUFFIX}", date.format("%Y-%m-%d"))
}

/// `diary_2025-12-14.json` -> 2025-12-14. Anything else is ignored.
fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

impl SessionStore for FileStorage {
    async fn save(&self, session: &Session) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DiaristError::Persistence(format!(
                "failed to create data directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(session.date());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)?;

        tokio::fs::write(&tmp, json).await.map_err(|e| {
            DiaristError::Persistence(format!("failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            DiaristError::Persistence(format!("failed to replace {}: {e}", path.display()))
        })?;

        tracing::info!(
            path = %path.display(),
            entries = session.entry_count(),
            "diary session saved"
        );
        Ok(())
    }

    async fn load(&self, date: NaiveDate) -> Result<Option<Session>> {
        let path = self.path_for(date);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DiaristError::Persistence(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let session: Session = serde_json::from_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            entries = session.entry_count(),
            "diary session loaded"
        );
        Ok(Some(session))
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        let path = self.path_for(date);
        tokio::fs::try_exists(&path).await.map_err(|e| {
            DiaristError::Persistence(format!("failed to stat {}: {e}", path.display()))
        })
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(DiaristError::Persistence(format!(
                    "failed to list {}: {e}",
                    self.dir.display()
                )))
            }
        };

        let mut dates = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| DiaristError::Persistence(format!("failed to list entries: {e}")))?
        {
            if let Some(date) = entry.file_name().to_str().and_then(date_from_file_name) {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}
