//! Downloading artifacts from the certificate server.

pub mod http;

use std::path::Path;

use crate::core::artifact::Artifact;
use crate::core::errors::Result;

pub use http::HttpFetcher;

/// Retrieves one artifact's bytes into a staging file.
///
/// Implementations must write to `staging` only on success and must never
/// touch `artifact.destination`. Any non-200 answer is a failure.
pub trait Fetcher {
    /// Download `artifact` into `staging`, returning the number of bytes written.
    fn fetch(&self, artifact: &Artifact, staging: &Path) -> Result<u64>;
}
