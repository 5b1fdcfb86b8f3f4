//! Journal - append-only JSONL log of interactions in MCP shape

use crate::wire::McpMessage;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("journal lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: Mutex<File>,
}

impl Journal {
    /// Open (or create) the log for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line
    pub fn append(&self, message: &McpMessage) -> Result<(), JournalError> {
        let line = serde_json::to_string(message)?;
        let mut file = self.file.lock().map_err(|_| JournalError::Poisoned)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Read every line back, skipping ones that fail to parse
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<McpMessage>, JournalError> {
        let reader = BufReader::new(File::open(path)?);
        let mut messages = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Ok(message) = serde_json::from_str(&line) {
                messages.push(message);
            }
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{InteractionKind, InteractionRecord};

    fn message(content: &str) -> McpMessage {
        McpMessage::from_record(&InteractionRecord {
            source: "UserAgent".to_string(),
            target: "CentralDispatcher".to_string(),
            content: content.to_string(),
            kind: InteractionKind::Message,
            timestamp: 0.0,
        })
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("history.jsonl");

        let journal = Journal::open(&path).unwrap();
        journal.append(&message("one")).unwrap();
        journal.append(&message("two")).unwrap();

        let lines = Journal::read_all(&path).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].content, "two");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        Journal::open(&path).unwrap().append(&message("first")).unwrap();
        Journal::open(&path).unwrap().append(&message("second")).unwrap();

        assert_eq!(Journal::read_all(&path).unwrap().len(), 2);
    }
}
