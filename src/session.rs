//! Analysis history kept by the command-line front end.
//!
//! The pipeline never touches this: `main` appends each finished report and
//! the `history` commands read, select and delete entries by index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, RobertaError};
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub report: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for HistoryEntry {
    fn from(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            report: report.body.clone(),
            created_at: report.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    entries: Vec<HistoryEntry>,
    active: Option<usize>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry at the end; it becomes the active one
    pub fn append(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push(entry);
        let index = self.entries.len() - 1;
        self.active = Some(index);
        index
    }

    pub fn select(&mut self, index: usize) -> Result<&HistoryEntry> {
        self.check_index(index)?;
        self.active = Some(index);
        Ok(&self.entries[index])
    }

    /// Remove an entry. The active selection is cleared.
    pub fn delete(&mut self, index: usize) -> Result<HistoryEntry> {
        self.check_index(index)?;
        self.active = None;
        Ok(self.entries.remove(index))
    }

    /// Start over without an active entry
    pub fn new_analysis(&mut self) {
        self.active = None;
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.filter(|&i| i < self.entries.len())
    }

    pub fn active_entry(&self) -> Option<&HistoryEntry> {
        self.active_index().map(|i| &self.entries[i])
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            return Err(RobertaError::Session(format!(
                "No history entry at index {} ({} entries)",
                index,
                self.entries.len()
            )));
        }
        Ok(())
    }
}

/// JSON file holding the session between runs
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the stored session, or an empty one if nothing was saved yet
    pub fn load(&self) -> Result<Session> {
        if !self.path.exists() {
            debug!("No history at {}, starting a new session", self.path.display());
            return Ok(Session::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&content)
            .map_err(|e| RobertaError::Session(format!("Failed to parse history file: {}", e)))?;
        Ok(session)
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {} history entries to {}", session.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> HistoryEntry {
        HistoryEntry {
            title: title.to_string(),
            report: format!("| report for {} |", title),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_makes_entry_active() {
        let mut session = Session::new();
        assert_eq!(session.append(entry("a.srt")), 0);
        assert_eq!(session.append(entry("b.srt")), 1);

        assert_eq!(session.active_index(), Some(1));
        assert_eq!(session.active_entry().unwrap().title, "b.srt");
    }

    #[test]
    fn test_select_and_new_analysis() {
        let mut session = Session::new();
        session.append(entry("a.srt"));
        session.append(entry("b.srt"));

        assert_eq!(session.select(0).unwrap().title, "a.srt");
        assert_eq!(session.active_index(), Some(0));
        assert!(session.select(2).is_err());
        assert_eq!(session.active_index(), Some(0));

        session.new_analysis();
        assert!(session.active_entry().is_none());
    }

    #[test]
    fn test_delete_clears_active_selection() {
        let mut session = Session::new();
        session.append(entry("a.srt"));
        session.append(entry("b.srt"));
        session.append(entry("c.srt"));

        let removed = session.delete(1).unwrap();
        assert_eq!(removed.title, "b.srt");
        assert_eq!(session.active_index(), None);

        let titles: Vec<&str> = session.entries().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["a.srt", "c.srt"]);

        assert!(matches!(session.delete(5), Err(RobertaError::Session(_))));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/history.json"));

        assert!(store.load().unwrap().is_empty());

        let mut session = Session::new();
        session.append(entry("a.srt"));
        store.save(&session).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, session);
    }
}
