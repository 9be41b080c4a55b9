/*!
 * Equality checks between source and destination entries
 *
 * Checks are tiered by cost: size, then metadata, then content. The sync
 * decision path only uses the first two; content comparison is kept for
 * verification.
 */

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use crate::error::{IoResultExt, Result};
use crate::metadata::EntryMetadata;

/// Stat `path`, mapping a missing entry to `None`
fn stat_if_exists(path: &Path) -> Result<Option<fs::Metadata>> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).at("stat", path),
    }
}

/// Compare byte lengths. Two missing paths are equal, one missing path is not.
pub fn equal_size(a: &Path, b: &Path) -> Result<bool> {
    if a == b {
        return Ok(true);
    }

    Ok(match (stat_if_exists(a)?, stat_if_exists(b)?) {
        (None, None) => true,
        (Some(a), Some(b)) => a.len() == b.len(),
        _ => false,
    })
}

/// Compare the full metadata tuple, with the same missing-path rule as [`equal_size`]
pub fn equal_metadata(a: &Path, b: &Path) -> Result<bool> {
    if a == b {
        return Ok(true);
    }

    Ok(match (stat_if_exists(a)?, stat_if_exists(b)?) {
        (None, None) => true,
        (Some(a), Some(b)) => EntryMetadata::from_fs(&a) == EntryMetadata::from_fs(&b),
        _ => false,
    })
}

/// Compare file contents block by block
///
/// Both files must be readable; an open or read failure is an error for this
/// comparison only.
pub fn equal_content(a: &Path, b: &Path, chunk_size: usize) -> Result<bool> {
    let mut file_a = File::open(a).at("open", a)?;
    let mut file_b = File::open(b).at("open", b)?;

    let mut block_a = vec![0u8; chunk_size];
    let mut block_b = vec![0u8; chunk_size];

    loop {
        let read_a = read_block(&mut file_a, &mut block_a).at("read", a)?;
        let read_b = read_block(&mut file_b, &mut block_b).at("read", b)?;

        if read_a != read_b || block_a[..read_a] != block_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows, returning the byte count (0 at EOF)
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
