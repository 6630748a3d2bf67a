//! Atomic replace of a destination file with explicit owner, group, and mode.
//!
//! The staged bytes are copied into a hidden sibling of the destination,
//! flushed, chowned, chmodded, then renamed over the destination. Readers see
//! either the old file or the complete new one, never a torn write.

use std::fs::{self, File, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::unistd::{Gid, Uid, chown};
use tempfile::NamedTempFile;

use crate::core::artifact::Ownership;
use crate::core::errors::{CpError, Result};

/// Install `staged` at `destination` with the given ownership.
///
/// On failure the previous destination is left as it was and the sibling
/// temp file is removed. The destination's parent directory must exist.
pub fn install_file(staged: &Path, destination: &Path, ownership: Ownership) -> Result<()> {
    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut pending = tempfile::Builder::new()
        .prefix(".certpull-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|source| map_io(destination, source))?;

    copy_into(staged, &mut pending, destination)?;
    apply_ownership(&pending, destination, ownership)?;

    pending
        .persist(destination)
        .map_err(|e| map_io(destination, e.error))?;

    // Best effort: make the rename itself durable.
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

fn copy_into(staged: &Path, pending: &mut NamedTempFile, destination: &Path) -> Result<()> {
    let mut source = File::open(staged).map_err(|e| CpError::io(staged, e))?;
    io::copy(&mut source, pending.as_file_mut()).map_err(|e| map_io(destination, e))?;
    pending
        .as_file()
        .sync_all()
        .map_err(|e| map_io(destination, e))
}

/// chown before chmod: changing owner may clear set-id bits.
fn apply_ownership(
    pending: &NamedTempFile,
    destination: &Path,
    ownership: Ownership,
) -> Result<()> {
    chown(
        pending.path(),
        Some(Uid::from_raw(ownership.uid)),
        Some(Gid::from_raw(ownership.gid)),
    )
    .map_err(|errno| match errno {
        Errno::EPERM | Errno::EACCES => CpError::PermissionDenied {
            path: destination.to_path_buf(),
            details: format!(
                "cannot set owner {}:{} ({errno})",
                ownership.uid, ownership.gid
            ),
        },
        other => CpError::io(destination, io::Error::from(other)),
    })?;

    fs::set_permissions(pending.path(), Permissions::from_mode(ownership.mode))
        .map_err(|e| map_io(destination, e))
}

fn map_io(destination: &Path, source: io::Error) -> CpError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        CpError::PermissionDenied {
            path: destination.to_path_buf(),
            details: source.to_string(),
        }
    } else {
        CpError::io(destination, source)
    }
}
