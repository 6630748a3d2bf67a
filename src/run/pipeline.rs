//! The fetch → diff → install → hook sequence for one run.
//!
//! Legs run strictly in order, certificate first. The first failure aborts the
//! run; anything installed before it stays installed. The staging workspace is
//! removed on every exit path.

use std::path::PathBuf;
use std::time::Instant;

use crate::core::artifact::ArtifactKind;
use crate::core::config::Settings;
use crate::core::errors::Result;
use crate::core::signals::InterruptLatch;
use crate::core::workspace::{Workspace, sha256_file};
use crate::fetch::Fetcher;
use crate::hook::{ProcessRunner, run_hook};
use crate::install::{content_changed, install_file};
use crate::logger::{EventType, JsonlWriter, LogEntry, Severity};
use crate::run::outcome::{ArtifactReport, HookStatus, RunOutcome, RunReport};

/// One run over both artifacts with injected collaborators.
pub struct Pipeline<'a> {
    settings: &'a Settings,
    fetcher: &'a dyn Fetcher,
    runner: &'a dyn ProcessRunner,
    interrupt: InterruptLatch,
    workspace_parent: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        fetcher: &'a dyn Fetcher,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            settings,
            fetcher,
            runner,
            interrupt: InterruptLatch::detached(),
            workspace_parent: None,
        }
    }

    /// Poll `latch` before each download; it also guards the workspace while
    /// staged files exist.
    #[must_use]
    pub fn with_interrupt(mut self, latch: InterruptLatch) -> Self {
        self.interrupt = latch;
        self
    }

    /// Stage downloads under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_workspace_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace_parent = Some(dir.into());
        self
    }

    /// Execute the run. Never panics on operational failure; the outcome and
    /// any error are in the returned report.
    pub fn run(&self, log: &mut JsonlWriter) -> RunReport {
        let started = Instant::now();
        log.write_entry(
            &LogEntry::new(EventType::RunStart, Severity::Info)
                .details(format!("name={}", self.settings.name)),
        );

        let mut report = RunReport::new(&self.settings.name);
        let result = self.execute(&mut report, log);
        self.interrupt.release();
        match result {
            Ok(outcome) => report.finish(outcome),
            Err(err) => {
                log.write_entry(&LogEntry::from_error(&err));
                report.fail(&err);
            }
        }
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let mut done = LogEntry::new(
            EventType::RunComplete,
            if report.outcome == RunOutcome::Failed {
                Severity::Critical
            } else {
                Severity::Info
            },
        )
        .details(report.outcome.label());
        done.exit_code = Some(report.exit_code);
        done.duration_ms = Some(report.duration_ms);
        log.write_entry(&done);

        report
    }

    fn execute(&self, report: &mut RunReport, log: &mut JsonlWriter) -> Result<RunOutcome> {
        let workspace = match &self.workspace_parent {
            Some(parent) => Workspace::create_in(parent)?,
            None => Workspace::create()?,
        };
        self.interrupt.guard(workspace.path());

        for kind in ArtifactKind::ORDERED {
            self.interrupt.check(&format!("{kind} download"))?;
            let entry = self.settle(kind, &workspace, log)?;
            report.artifacts.push(entry);
        }

        // Key material leaves the disk before any hook runs.
        self.interrupt.release();
        if let Err(err) = workspace.close() {
            log.write_entry(
                &LogEntry::new(EventType::Error, Severity::Warning)
                    .details(format!("workspace cleanup: {err}")),
            );
        }

        let outcome = RunOutcome::from_decisions(report.artifacts.iter().map(|a| a.changed));
        match self.finish_hook(outcome, log) {
            Ok(status) => report.hook = Some(status),
            Err(err) => {
                report.hook = Some(HookStatus::Failed);
                return Err(err);
            }
        }
        Ok(outcome)
    }

    /// Fetch, compare, and install when changed, for one artifact.
    fn settle(
        &self,
        kind: ArtifactKind,
        workspace: &Workspace,
        log: &mut JsonlWriter,
    ) -> Result<ArtifactReport> {
        let artifact = self.settings.artifact(kind);
        let staged = workspace.staging_path(kind);

        let size = self.fetcher.fetch(artifact, &staged)?;
        let sha256 = sha256_file(&staged)?;
        log.write_entry(
            &LogEntry::new(EventType::FetchComplete, Severity::Info)
                .artifact(kind, &artifact.destination)
                .payload(size, &sha256),
        );

        let changed = content_changed(&staged, &artifact.destination)?;
        if changed {
            install_file(&staged, &artifact.destination, self.settings.ownership)?;
        }
        log.write_entry(
            &LogEntry::new(
                if changed {
                    EventType::ArtifactInstalled
                } else {
                    EventType::ArtifactUnchanged
                },
                Severity::Info,
            )
            .artifact(kind, &artifact.destination)
            .payload(size, &sha256),
        );

        Ok(ArtifactReport {
            kind,
            destination: artifact.destination.clone(),
            changed,
            size,
            sha256,
        })
    }

    fn finish_hook(&self, outcome: RunOutcome, log: &mut JsonlWriter) -> Result<HookStatus> {
        if outcome != RunOutcome::Updated {
            return Ok(HookStatus::NotNeeded);
        }
        let Some(hook) = self.settings.hook.as_deref() else {
            log.write_entry(
                &LogEntry::new(EventType::HookSkipped, Severity::Info)
                    .details("no hook configured"),
            );
            return Ok(HookStatus::NotConfigured);
        };

        let status = run_hook(
            self.runner,
            hook,
            &self.settings.certificate.destination,
            &self.settings.private_key.destination,
        )?;
        let mut entry = LogEntry::new(EventType::HookComplete, Severity::Info)
            .details(format!("{} {status}", hook.display()));
        entry.path = Some(hook.display().to_string());
        log.write_entry(&entry);
        Ok(HookStatus::Succeeded)
    }
}
