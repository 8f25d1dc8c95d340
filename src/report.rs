use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::error::Result;

/// Separator between chunk results in a report
pub const RESULT_SEPARATOR: &str = "\n\n";

/// Full analysis output for one subtitle file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Original file name
    pub title: String,
    /// Chunk results joined in chunk order
    pub body: String,
    pub chunk_count: usize,
    pub failed_chunks: usize,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(title: impl Into<String>, results: &[String], chunk_count: usize, failed_chunks: usize) -> Self {
        Self {
            title: title.into(),
            body: results.join(RESULT_SEPARATOR),
            chunk_count,
            failed_chunks,
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }

    /// Name of the downloadable artifact, `correzione_<file name>.txt`
    pub fn artifact_name(&self) -> String {
        format!("correzione_{}.txt", self.title)
    }

    /// Write the report body into `dir` under its artifact name
    pub async fn write_artifact<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = dir.as_ref().join(self.artifact_name());
        fs::write(&path, &self.body).await?;
        info!("Report written to {}", path.display());
        Ok(path)
    }
}
