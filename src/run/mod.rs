//! Outcome reporting and the run pipeline that drives it.

pub mod outcome;
pub mod pipeline;

pub use outcome::{HookStatus, RunOutcome, RunReport, format_report};
pub use pipeline::Pipeline;
