//! The two artifacts a run manages and the metadata they are installed with.

use std::fmt;
use std::path::PathBuf;

use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Which half of the certificate pair an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Certificate,
    PrivateKey,
}

impl ArtifactKind {
    /// Processing order within a run.
    pub const ORDERED: [Self; 2] = [Self::Certificate, Self::PrivateKey];

    /// Server path segment under `download/`.
    #[must_use]
    pub const fn endpoint_segment(self) -> &'static str {
        match self {
            Self::Certificate => "certificates",
            Self::PrivateKey => "privatekeys",
        }
    }

    /// File name used while the artifact is staged in the run workspace.
    #[must_use]
    pub const fn staging_name(self) -> &'static str {
        match self {
            Self::Certificate => "certificate.pem",
            Self::PrivateKey => "privatekey.pem",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::PrivateKey => "private key",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque API credential. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw credential, for placing in a request header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Owner, group, and permission bits applied to every installed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl Ownership {
    /// Permission bits applied when none are configured.
    pub const DEFAULT_MODE: u32 = 0o600;
}

/// One fetch-diff-install unit.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub url: Url,
    pub api_key: ApiKey,
    pub destination: PathBuf,
}
