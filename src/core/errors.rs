//! CP-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::artifact::ArtifactKind;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, CpError>;

/// Exit code reported for every failed run.
pub const EXIT_FAILURE: i32 = 1;

/// Top-level error type for certpull.
#[derive(Debug, Error)]
pub enum CpError {
    #[error("[CP-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[CP-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[CP-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[CP-1004] missing required parameter: {name}")]
    MissingParameter { name: &'static str },

    #[error("[CP-1005] cannot resolve {kind} {value:?}: {details}")]
    UnresolvedIdentity {
        kind: &'static str,
        value: String,
        details: String,
    },

    #[error("[CP-1006] hook does not exist: {path}")]
    HookNotFound { path: PathBuf },

    #[error("[CP-2001] {artifact} download failed with HTTP status {status}")]
    FetchStatus { artifact: ArtifactKind, status: u16 },

    #[error("[CP-2002] {artifact} download failed: {details}")]
    FetchTransport {
        artifact: ArtifactKind,
        details: String,
    },

    #[error("[CP-3001] permission denied installing {path}: {details}")]
    PermissionDenied { path: PathBuf, details: String },

    #[error("[CP-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CP-4001] hook is not executable: {path}")]
    HookNotExecutable { path: PathBuf },

    #[error("[CP-4002] hook {path} failed: {status}")]
    HookFailed { path: PathBuf, status: String },

    #[error("[CP-4003] hook {path} could not be started: {source}")]
    HookSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CP-5001] interrupted by signal before {stage}")]
    Interrupted { stage: String },
}

impl CpError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "CP-1001",
            Self::MissingConfig { .. } => "CP-1002",
            Self::ConfigParse { .. } => "CP-1003",
            Self::MissingParameter { .. } => "CP-1004",
            Self::UnresolvedIdentity { .. } => "CP-1005",
            Self::HookNotFound { .. } => "CP-1006",
            Self::FetchStatus { .. } => "CP-2001",
            Self::FetchTransport { .. } => "CP-2002",
            Self::PermissionDenied { .. } => "CP-3001",
            Self::Io { .. } => "CP-3002",
            Self::HookNotExecutable { .. } => "CP-4001",
            Self::HookFailed { .. } => "CP-4002",
            Self::HookSpawn { .. } => "CP-4003",
            Self::Interrupted { .. } => "CP-5001",
        }
    }

    /// HTTP status carried by a fetch failure, if the server answered at all.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::FetchStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Process exit code for this failure. Every error is fatal to the run.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<toml::de::Error> for CpError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<CpError> {
        vec![
            CpError::InvalidConfig {
                details: String::new(),
            },
            CpError::MissingConfig {
                path: PathBuf::new(),
            },
            CpError::ConfigParse {
                context: "",
                details: String::new(),
            },
            CpError::MissingParameter { name: "" },
            CpError::UnresolvedIdentity {
                kind: "user",
                value: String::new(),
                details: String::new(),
            },
            CpError::HookNotFound {
                path: PathBuf::new(),
            },
            CpError::FetchStatus {
                artifact: ArtifactKind::Certificate,
                status: 404,
            },
            CpError::FetchTransport {
                artifact: ArtifactKind::PrivateKey,
                details: String::new(),
            },
            CpError::PermissionDenied {
                path: PathBuf::new(),
                details: String::new(),
            },
            CpError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            CpError::HookNotExecutable {
                path: PathBuf::new(),
            },
            CpError::HookFailed {
                path: PathBuf::new(),
                status: String::new(),
            },
            CpError::HookSpawn {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            CpError::Interrupted {
                stage: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(CpError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_includes_code() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.starts_with(&format!("[{}]", err.code())),
                "display should lead with the code: {msg}"
            );
        }
    }

    #[test]
    fn every_error_exits_with_one() {
        for err in all_variants() {
            assert_eq!(err.exit_code(), 1, "{}", err.code());
        }
    }

    #[test]
    fn fetch_status_is_exposed() {
        let err = CpError::FetchStatus {
            artifact: ArtifactKind::PrivateKey,
            status: 401,
        };
        assert_eq!(err.http_status(), Some(401));
        assert!(err.to_string().contains("private key"));
        assert!(err.to_string().contains("401"));

        let transport = CpError::FetchTransport {
            artifact: ArtifactKind::Certificate,
            details: "connection refused".to_string(),
        };
        assert_eq!(transport.http_status(), None);
    }

    #[test]
    fn io_convenience_constructor() {
        let err = CpError::io(
            "/tmp/test.pem",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "CP-3002");
        assert!(err.to_string().contains("/tmp/test.pem"));
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: CpError = toml_err.into();
        assert_eq!(err.code(), "CP-1003");
    }
}
