//! Blocking HTTP fetcher for the certificate server's download API.

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;

use crate::core::artifact::Artifact;
use crate::core::errors::{CpError, Result};
use crate::fetch::Fetcher;

/// Request header carrying the per-artifact API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Fetches artifacts with a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client. `None` means requests never time out.
    ///
    /// Redirects are never followed: a 3xx is a failed download, and the API
    /// key is only ever sent to the configured server.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("certpull/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| CpError::InvalidConfig {
                details: format!("HTTP client setup failed: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, artifact: &Artifact, staging: &Path) -> Result<u64> {
        let transport = |e: reqwest::Error| CpError::FetchTransport {
            artifact: artifact.kind,
            details: e.to_string(),
        };

        let mut response = self
            .client
            .get(artifact.url.clone())
            .header(API_KEY_HEADER, artifact.api_key.expose())
            .send()
            .map_err(transport)?;

        if response.status() != StatusCode::OK {
            return Err(CpError::FetchStatus {
                artifact: artifact.kind,
                status: response.status().as_u16(),
            });
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(staging)
            .map_err(|source| CpError::io(staging, source))?;
        let written = response.copy_to(&mut file).map_err(transport)?;
        file.sync_all().map_err(|source| CpError::io(staging, source))?;
        Ok(written)
    }
}
