//! Interrupt latch: SIGINT/SIGTERM/SIGHUP are recorded instead of killing the
//! process, so the run can stop between steps and still remove its workspace.
//!
//! A second signal while the latch is already set removes the guarded
//! workspace directory and exits immediately. This is the only way out of a
//! download that is blocked on the network.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::Mutex;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::core::errors::{CpError, EXIT_FAILURE, Result};

const LATCHED_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Shared interrupt flag polled by the run between steps.
#[derive(Clone, Debug, Default)]
pub struct InterruptLatch {
    flag: Arc<AtomicBool>,
    guarded: Arc<Mutex<Option<PathBuf>>>,
}

impl InterruptLatch {
    /// Create a latch wired to the process signal handlers.
    ///
    /// Registration is best-effort; failures are reported on stderr but not fatal.
    pub fn install() -> Self {
        let latch = Self::default();
        let mut signals = match Signals::new(LATCHED_SIGNALS) {
            Ok(signals) => signals,
            Err(e) => {
                eprintln!("[CP-SIGNAL] failed to register signal handlers: {e}");
                return latch;
            }
        };

        let watcher = latch.clone();
        let spawned = thread::Builder::new()
            .name("certpull-signals".to_string())
            .spawn(move || {
                for signal in signals.forever() {
                    if watcher.record_signal() {
                        let removed = watcher.remove_guarded();
                        let err = CpError::Interrupted {
                            stage: format!("completion (signal {signal} received twice)"),
                        };
                        eprintln!("certpull: {err}");
                        if let Some(path) = removed {
                            eprintln!("certpull: removed workspace {}", path.display());
                        }
                        std::process::exit(EXIT_FAILURE);
                    }
                }
            });
        if let Err(e) = spawned {
            eprintln!("[CP-SIGNAL] failed to start signal watcher: {e}");
        }
        latch
    }

    /// A latch with no signal handlers attached.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Programmatically trip the latch.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Fail with [`CpError::Interrupted`] if a signal has arrived.
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_set() {
            return Err(CpError::Interrupted {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }

    /// Directory to delete if the process is forced to exit.
    pub fn guard(&self, dir: &Path) {
        *self.guarded.lock() = Some(dir.to_path_buf());
    }

    /// Stop guarding; the owner has removed the directory itself.
    pub fn release(&self) {
        self.guarded.lock().take();
    }

    /// Latch one signal. Returns true when the latch was already set.
    fn record_signal(&self) -> bool {
        self.flag.swap(true, Ordering::SeqCst)
    }

    /// Remove the guarded directory, if any, returning its path.
    fn remove_guarded(&self) -> Option<PathBuf> {
        let path = self.guarded.lock().take()?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                eprintln!("[CP-SIGNAL] failed to remove {}: {e}", path.display());
                None
            }
        }
    }
}
