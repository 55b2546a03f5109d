use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One timestamped piece of user text. Entries are never edited after
/// creation; their order inside a session is creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub timestamp: DateTime<Local>,
    pub content: String,
}

impl Entry {
    pub fn new(content: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            content: content.into(),
        }
    }
}
