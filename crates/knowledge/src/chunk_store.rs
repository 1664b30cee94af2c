//! Line-oriented chunk text storage.
//!
//! Line `N` of the file is the chunk at position `N`. Records are escaped so
//! a chunk can never span lines: `\` as `\\`, newline as `\n`, carriage
//! return as `\r`.
//!
//! A record only counts once its newline is on disk. Bytes after the last
//! newline come from an interrupted append; they are ignored on load and
//! cut off by the next append or truncate.

use crate::types::Chunk;
use ragbasics_core::{AppError, AppResult};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ChunkStore {
    path: PathBuf,
    records: Vec<String>,
    /// Byte offset just past each record's newline
    ends: Vec<u64>,
    /// Length of the unterminated fragment after the last record
    torn_tail: u64,
}

impl ChunkStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> AppResult<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
            ends: Vec::new(),
            torn_tail: 0,
        };

        if !path.exists() {
            return Ok(store);
        }

        let bytes = fs::read(path).map_err(|e| {
            AppError::IndexUnavailable(format!("Cannot read chunk store {:?}: {}", path, e))
        })?;
        // The tail may stop mid-escape or mid-character, so split before decoding.
        let committed = bytes
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |last| last + 1);
        store.torn_tail = (bytes.len() - committed) as u64;
        if store.torn_tail > 0 {
            tracing::warn!(
                "Chunk store {:?} ends with {} bytes of an interrupted append; ignoring them",
                path,
                store.torn_tail
            );
        }

        let content = std::str::from_utf8(&bytes[..committed]).map_err(|e| {
            AppError::IndexUnavailable(format!("Chunk store {:?} is not UTF-8: {}", path, e))
        })?;

        let mut offset = 0u64;
        for (line_no, line) in content.split_inclusive('\n').enumerate() {
            offset += line.len() as u64;
            let raw = line.strip_suffix('\n').unwrap_or(line);
            let text = unescape(raw).ok_or_else(|| {
                AppError::IndexUnavailable(format!(
                    "Chunk store {:?} has a malformed record at line {}",
                    path,
                    line_no + 1
                ))
            })?;
            store.records.push(text);
            store.ends.push(offset);
        }

        tracing::debug!("Loaded chunk store {:?} ({} records)", path, store.len());
        Ok(store)
    }

    /// Like [`ChunkStore::open`], but the file must exist.
    pub fn open_existing(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::IndexUnavailable(format!(
                "Chunk store {:?} does not exist",
                path
            )));
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the file ends in a partial record from an interrupted append.
    pub fn has_torn_tail(&self) -> bool {
        self.torn_tail > 0
    }

    /// Append one record per chunk, in order, and sync to disk.
    ///
    /// A failed write is rolled back to the previous length.
    pub fn append(&mut self, chunks: &[String]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let start = self.ends.last().copied().unwrap_or(0);
        let mut buffer = String::new();
        let mut ends = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            buffer.push_str(&escape(chunk));
            buffer.push('\n');
            ends.push(start + buffer.len() as u64);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.torn_tail > 0 {
            file.set_len(start)?;
            self.torn_tail = 0;
        }

        let written = file
            .write_all(buffer.as_bytes())
            .and_then(|_| file.sync_all());

        if let Err(e) = written {
            if let Err(rollback) = file.set_len(start) {
                tracing::warn!(
                    "Failed to roll back chunk store {:?} to {} bytes: {}",
                    self.path,
                    start,
                    rollback
                );
            }
            return Err(AppError::Io(e));
        }

        self.records.extend(chunks.iter().cloned());
        self.ends.extend(ends);
        Ok(())
    }

    /// Chunks at `positions`, in the requested order. Positions past the end
    /// of the store are skipped.
    pub fn get(&self, positions: &[usize]) -> Vec<Chunk> {
        positions
            .iter()
            .filter_map(|&position| {
                self.records.get(position).map(|text| Chunk {
                    position,
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Drop every record at or after `len`, and any partial record.
    pub fn truncate(&mut self, len: usize) -> AppResult<()> {
        if len >= self.records.len() && self.torn_tail == 0 {
            return Ok(());
        }
        let len = len.min(self.records.len());

        let byte_len = if len == 0 { 0 } else { self.ends[len - 1] };
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(byte_len)?;
        file.sync_all()?;

        self.records.truncate(len);
        self.ends.truncate(len);
        self.torn_tail = 0;

        tracing::debug!("Truncated chunk store {:?} to {} records", self.path, len);
        Ok(())
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(line: &str) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}
