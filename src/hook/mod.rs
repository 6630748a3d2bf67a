//! Post-install hook invocation behind a small process-execution seam.

use std::ffi::OsStr;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Command;

use nix::unistd::{AccessFlags, access};

use crate::core::errors::{CpError, Result};

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Exited(i32),
    Signaled(i32),
}

impl ProcessStatus {
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit status {code}"),
            Self::Signaled(sig) => write!(f, "killed by signal {sig}"),
        }
    }
}

/// Runs an external program to completion.
pub trait ProcessRunner {
    /// Run `program` with `args`, blocking until it exits.
    ///
    /// A program that cannot be started is an `Err`; a program that runs and
    /// fails is an `Ok` carrying its status.
    fn run(&self, program: &Path, args: &[&OsStr]) -> std::io::Result<ProcessStatus>;
}

/// Runs programs with `std::process::Command`, inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&OsStr]) -> std::io::Result<ProcessStatus> {
        let status = Command::new(program).args(args).status()?;
        Ok(status.code().map_or_else(
            || ProcessStatus::Signaled(status.signal().unwrap_or(0)),
            ProcessStatus::Exited,
        ))
    }
}

/// Whether `path` is a regular file the current user may execute.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}

/// Invoke `hook` with the installed certificate and key paths, in that order.
///
/// Executability is checked here, at invocation time. A nonzero exit is a
/// [`CpError::HookFailed`]; nothing already installed is rolled back.
pub fn run_hook(
    runner: &dyn ProcessRunner,
    hook: &Path,
    cert_path: &Path,
    key_path: &Path,
) -> Result<ProcessStatus> {
    if !is_executable(hook) {
        return Err(CpError::HookNotExecutable {
            path: hook.to_path_buf(),
        });
    }

    let status = runner
        .run(hook, &[cert_path.as_os_str(), key_path.as_os_str()])
        .map_err(|source| CpError::HookSpawn {
            path: hook.to_path_buf(),
            source,
        })?;

    if status.success() {
        Ok(status)
    } else {
        Err(CpError::HookFailed {
            path: hook.to_path_buf(),
            status: status.to_string(),
        })
    }
}
