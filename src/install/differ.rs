//! Byte-for-byte comparison of a staged download against the installed file.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::core::errors::{CpError, Result};
use crate::core::workspace::is_not_found;

const CHUNK: usize = 16 * 1024;

/// Whether installing `staged` at `destination` would change its content.
///
/// A missing destination counts as changed. Equality is exact: reordered PEM
/// blocks or a trailing newline make the files differ.
pub fn content_changed(staged: &Path, destination: &Path) -> Result<bool> {
    let installed = match File::open(destination) {
        Ok(file) => file,
        Err(e) if is_not_found(&e) => return Ok(true),
        Err(e) => return Err(CpError::io(destination, e)),
    };
    let fresh = File::open(staged).map_err(|source| CpError::io(staged, source))?;

    let installed_meta = installed
        .metadata()
        .map_err(|source| CpError::io(destination, source))?;
    if !installed_meta.is_file() {
        return Err(CpError::io(
            destination,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    let installed_len = installed_meta.len();
    let fresh_len = fresh
        .metadata()
        .map_err(|source| CpError::io(staged, source))?
        .len();
    if installed_len != fresh_len {
        return Ok(true);
    }

    let mut installed = BufReader::new(installed);
    let mut fresh = BufReader::new(fresh);
    let mut a = vec![0_u8; CHUNK];
    let mut b = vec![0_u8; CHUNK];
    loop {
        let n = read_full(&mut fresh, &mut a).map_err(|source| CpError::io(staged, source))?;
        let m = read_full(&mut installed, &mut b)
            .map_err(|source| CpError::io(destination, source))?;
        if n != m || a[..n] != b[..m] {
            return Ok(true);
        }
        if n == 0 {
            return Ok(false);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
