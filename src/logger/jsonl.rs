//! JSONL activity log: one self-contained JSON object per line.
//!
//! Each line is assembled in memory and written with a single `write_all` on an
//! `O_APPEND` handle, so concurrent tailers never see interleaved partial lines.
//!
//! Degradation chain:
//! 1. Configured file path
//! 2. stderr with `[CP-JSONL]` prefix
//! 3. Silent discard (logging never fails a run)
//!
//! Entries carry sizes and digests only, never credentials or payload bytes.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::artifact::ArtifactKind;
use crate::core::errors::{CpError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types for one certpull run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    FetchComplete,
    ArtifactUnchanged,
    ArtifactInstalled,
    HookSkipped,
    HookComplete,
    RunComplete,
    Error,
}

/// A single JSONL log entry. All fields are optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Size in bytes of the downloaded payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    /// HTTP status of a failed download.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            artifact: None,
            path: None,
            size: None,
            sha256: None,
            status: None,
            exit_code: None,
            duration_ms: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    #[must_use]
    pub fn artifact(mut self, kind: ArtifactKind, path: &Path) -> Self {
        self.artifact = Some(kind);
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn payload(mut self, size: u64, sha256: &str) -> Self {
        self.size = Some(size);
        self.sha256 = Some(sha256.to_string());
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Error entry for a failed run.
    pub fn from_error(err: &CpError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Critical);
        entry.status = err.http_status();
        entry.exit_code = Some(err.exit_code());
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry
    }
}

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to the configured file.
    Normal,
    /// File failed, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
    /// No log configured.
    Disabled,
}

/// Append-only JSONL writer with stderr fallback.
#[derive(Debug)]
pub struct JsonlWriter {
    file: Option<File>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open `path` for appending. Falls through the degradation chain on failure.
    pub fn open(path: PathBuf) -> Self {
        match open_append(&path) {
            Ok(file) => Self {
                file: Some(file),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(io::stderr(), "[CP-JSONL] {e}; using stderr");
                Self {
                    file: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// A writer that drops every entry.
    pub fn disabled() -> Self {
        Self {
            file: None,
            state: WriterState::Disabled,
        }
    }

    /// Open `path` when set, otherwise a disabled writer.
    pub fn from_option(path: Option<PathBuf>) -> Self {
        path.map_or_else(Self::disabled, Self::open)
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        if self.state == WriterState::Disabled {
            return;
        }
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[CP-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    #[cfg(test)]
    fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
            WriterState::Disabled => "disabled",
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let ok = self
                    .file
                    .as_mut()
                    .is_some_and(|f| f.write_all(line.as_bytes()).is_ok());
                if !ok {
                    self.file = None;
                    self.state = WriterState::Stderr;
                    let _ = writeln!(io::stderr(), "[CP-JSONL] log write failed, using stderr");
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[CP-JSONL] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard | WriterState::Disabled => {}
        }
    }
}

/// Open or create a file for appending, creating parent directories.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CpError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| CpError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
