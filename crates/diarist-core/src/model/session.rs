use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::Entry;
use crate::error::{DiaristError, Result};

/// The three sections the model produces for a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    pub diary: String,
    pub summary: String,
    pub insights: String,
}

/// One day of journaling, from the start command to close.
///
/// Fields are private so the lifecycle rules hold: entries are only appended
/// while active, `end_time` is written once, and the generated sections are
/// either all present or all absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    date: NaiveDate,
    start_time: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Local>>,
    active: bool,
    #[serde(default)]
    entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generated_diary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insights: Option<String>,
}

impl Session {
    /// Open a new, empty session dated to the local day of `now`.
    pub fn start(now: DateTime<Local>) -> Self {
        Self {
            date: now.date_naive(),
            start_time: now,
            end_time: None,
            active: true,
            entries: Vec::new(),
            generated_diary: None,
            summary: None,
            insights: None,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end_time
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry texts in chronological order, as fed to the prompt builder.
    pub fn entry_contents(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.content.clone()).collect()
    }

    /// The generated sections, if the session was completed by the model.
    pub fn reflection(&self) -> Option<Reflection> {
        match (&self.generated_diary, &self.summary, &self.insights) {
            (Some(diary), Some(summary), Some(insights)) => Some(Reflection {
                diary: diary.clone(),
                summary: summary.clone(),
                insights: insights.clone(),
            }),
            _ => None,
        }
    }

    /// Append an entry. Fails once the session is closed.
    pub fn push_entry(&mut self, content: impl Into<String>, at: DateTime<Local>) -> Result<()> {
        if !self.active {
            return Err(DiaristError::InvalidInput(format!(
                "session for {} is closed; entries can no longer be added",
                self.date
            )));
        }
        self.entries.push(Entry::new(content, at));
        Ok(())
    }

    /// Close the session without generated content. Returns `false` if it was
    /// already closed, in which case nothing changes.
    pub fn close(&mut self, at: DateTime<Local>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.end_time = Some(at);
        true
    }

    /// Store the model's sections and close the session in one step.
    pub fn complete(&mut self, reflection: Reflection, at: DateTime<Local>) -> Result<()> {
        if !self.active {
            return Err(DiaristError::InvalidInput(format!(
                "session for {} is already closed",
                self.date
            )));
        }
        self.generated_diary = Some(reflection.diary);
        self.summary = Some(reflection.summary);
        self.insights = Some(reflection.insights);
        self.close(at);
        Ok(())
    }
}
