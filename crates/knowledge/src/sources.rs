//! The sources log: one JSON line per vectorized source.
//!
//! The log is informational. The index and chunk store are authoritative,
//! so unreadable lines are skipped with a warning.

use crate::config::get_sources_path;
use crate::types::KnowledgeSource;
use ragbasics_core::AppResult;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SourceLog {
    path: PathBuf,
}

impl SourceLog {
    pub fn new(workspace: &Path, base_name: &str) -> Self {
        Self {
            path: get_sources_path(workspace, base_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record.
    pub fn record(&self, source: &KnowledgeSource) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(source)?;
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        tracing::debug!("Recorded source {} ({} chunks)", source.source, source.chunk_count);
        Ok(())
    }

    /// All readable records, oldest first.
    pub fn list(&self) -> AppResult<Vec<KnowledgeSource>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut sources = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<KnowledgeSource>(&line) {
                Ok(source) => sources.push(source),
                Err(e) => tracing::warn!(
                    "Skipping unreadable line {} in {:?}: {}",
                    line_num + 1,
                    self.path,
                    e
                ),
            }
        }

        Ok(sources)
    }

    /// Delete the log.
    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
            tracing::debug!("Removed {:?}", self.path);
        }
        Ok(())
    }
}

/// The source that contributed the chunk at `position`.
pub fn source_for_position(
    sources: &[KnowledgeSource],
    position: usize,
) -> Option<&KnowledgeSource> {
    sources.iter().find(|s| {
        position >= s.first_position && position < s.first_position + s.chunk_count
    })
}
