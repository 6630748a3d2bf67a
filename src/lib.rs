#![forbid(unsafe_code)]

//! certpull: fetch a TLS certificate and private key from a certificate
//! server and install them only when their bytes changed.
//!
//! One run is strictly sequential:
//! 1. **Fetch** each artifact (certificate, then key) into a private workspace
//! 2. **Diff** it byte-for-byte against the installed file
//! 3. **Install** it atomically with the configured owner, group, and mode when changed
//! 4. **Hook**: run the post-install executable if anything changed
//!
//! The exit code tells the caller what happened: `0` updated, `2` unchanged,
//! `1` failed.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use certpull::prelude::*;
//!
//! # fn main() -> certpull::core::errors::Result<()> {
//! let settings = Config::load(None)?.resolve(default_hook_path().as_deref())?;
//! let fetcher = HttpFetcher::new(settings.timeout)?;
//! let mut log = JsonlWriter::from_option(settings.activity_log.clone());
//! let report = Pipeline::new(&settings, &fetcher, &SystemRunner).run(&mut log);
//! std::process::exit(report.exit_code);
//! # }
//! ```

pub mod prelude;

pub mod core;
pub mod fetch;
pub mod hook;
pub mod install;
pub mod logger;
pub mod run;
