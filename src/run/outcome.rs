//! Run outcome, exit-code contract, and the serializable run report.

#![allow(missing_docs)]

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::artifact::ArtifactKind;
use crate::core::errors::{CpError, EXIT_FAILURE};

/// Exit code when at least one artifact was installed and the hook succeeded.
pub const EXIT_UPDATED: i32 = 0;
/// Exit code when both artifacts were already byte-identical on disk.
pub const EXIT_UNCHANGED: i32 = 2;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Updated,
    #[serde(rename = "unchanged")]
    NoChange,
    Failed,
}

impl RunOutcome {
    /// `Updated` if any artifact changed, otherwise `NoChange`.
    pub fn from_decisions(changed: impl IntoIterator<Item = bool>) -> Self {
        if changed.into_iter().any(|c| c) {
            Self::Updated
        } else {
            Self::NoChange
        }
    }

    /// Process exit code contract relied on by cron jobs and timers.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Updated => EXIT_UPDATED,
            Self::NoChange => EXIT_UNCHANGED,
            Self::Failed => EXIT_FAILURE,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::NoChange => "unchanged",
            Self::Failed => "failed",
        }
    }
}

/// What happened with the post-install hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    /// Nothing changed, so the hook was not due.
    NotNeeded,
    /// Something changed but no hook is configured.
    NotConfigured,
    Succeeded,
    Failed,
}

/// Per-artifact result of the fetch-diff-install leg.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub kind: ArtifactKind,
    pub destination: PathBuf,
    pub changed: bool,
    pub size: u64,
    pub sha256: String,
}

/// Error summary attached to a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportedError {
    pub code: String,
    pub message: String,
}

/// Everything a caller needs to know about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub outcome: RunOutcome,
    pub exit_code: i32,
    pub artifacts: Vec<ArtifactReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookStatus>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportedError>,
}

impl RunReport {
    /// Empty report for a run that has not finished yet.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: RunOutcome::Failed,
            exit_code: EXIT_FAILURE,
            artifacts: Vec::new(),
            hook: None,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.exit_code = outcome.exit_code();
        self.error = None;
    }

    pub fn fail(&mut self, err: &CpError) {
        self.outcome = RunOutcome::Failed;
        self.exit_code = err.exit_code();
        self.error = Some(ReportedError {
            code: err.code().to_string(),
            message: err.to_string(),
        });
    }

    /// Whether `kind` was installed during this run.
    #[must_use]
    pub fn installed(&self, kind: ArtifactKind) -> bool {
        self.artifacts.iter().any(|a| a.kind == kind && a.changed)
    }
}

/// Short plain-text summary of a run.
#[must_use]
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();
    for artifact in &report.artifacts {
        let verb = if artifact.changed {
            "installed"
        } else {
            "unchanged"
        };
        let _ = writeln!(
            out,
            "{:<12} {verb:<10} {} ({} bytes, sha256 {})",
            artifact.kind.label(),
            artifact.destination.display(),
            artifact.size,
            short_digest(&artifact.sha256),
        );
    }
    match report.hook {
        Some(HookStatus::Succeeded) => out.push_str("hook         succeeded\n"),
        Some(HookStatus::Failed) => out.push_str("hook         failed\n"),
        Some(HookStatus::NotConfigured) => out.push_str("hook         not configured\n"),
        Some(HookStatus::NotNeeded) | None => {}
    }
    let _ = writeln!(
        out,
        "{}: {} (exit {})",
        report.name,
        report.outcome.label(),
        report.exit_code
    );
    out
}

fn short_digest(sha256: &str) -> &str {
    sha256.get(..12).unwrap_or(sha256)
}
