//! Private, self-cleaning staging directory for one run's downloads.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::core::artifact::ArtifactKind;
use crate::core::errors::{CpError, Result};

/// Uniquely named `0700` directory removed when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory.
    pub fn create() -> Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh workspace under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix("certpull-")
            .tempdir_in(parent)
            .map_err(|source| CpError::io(parent, source))?;
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o700))
            .map_err(|source| CpError::io(dir.path(), source))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded bytes for `kind` are staged.
    #[must_use]
    pub fn staging_path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.path().join(kind.staging_name())
    }

    /// Remove the workspace now, surfacing any removal error.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|source| CpError::io(path, source))
    }
}

/// SHA-256 hex digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|source| CpError::io(path, source))?;
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|source| CpError::io(path, source))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}

/// True when `err` means the file simply is not there.
pub(crate) fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_private_and_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create_in(parent.path()).unwrap();
            let mode = fs::metadata(ws.path()).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o700);
            fs::write(ws.staging_path(ArtifactKind::PrivateKey), b"secret").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn close_removes_workspace() {
        let parent = tempfile::tempdir().unwrap();
        let ws = Workspace::create_in(parent.path()).unwrap();
        let path = ws.path().to_path_buf();
        ws.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn staging_paths_are_distinct_per_kind() {
        let ws = Workspace::create().unwrap();
        assert_ne!(
            ws.staging_path(ArtifactKind::Certificate),
            ws.staging_path(ArtifactKind::PrivateKey)
        );
        assert!(ws.staging_path(ArtifactKind::Certificate).starts_with(ws.path()));
    }

    #[test]
    fn sha256_known_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hello");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn sha256_missing_file_is_io_error() {
        let err = sha256_file(Path::new("/nonexistent/certpull.pem")).expect_err("missing");
        assert_eq!(err.code(), "CP-3002");
    }
}
