//! Core types: errors, configuration, artifacts, and run-scoped resources.

pub mod artifact;
pub mod config;
pub mod errors;
pub mod signals;
pub mod workspace;
