//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use certpull::prelude::*;
//! ```

// Core
pub use crate::core::artifact::{ApiKey, Artifact, ArtifactKind, Ownership};
pub use crate::core::config::{Config, Settings, default_hook_path};
pub use crate::core::errors::{CpError, Result};
pub use crate::core::signals::InterruptLatch;

// Components
pub use crate::fetch::{Fetcher, HttpFetcher};
pub use crate::hook::{ProcessRunner, ProcessStatus, SystemRunner};
pub use crate::install::{content_changed, install_file};
pub use crate::logger::JsonlWriter;

// Run
pub use crate::run::{HookStatus, Pipeline, RunOutcome, RunReport};
