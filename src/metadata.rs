/*!
 * Reading and applying entry metadata
 *
 * Timestamps, ownership and permission bits are captured and applied as a
 * single unit. Captures are never cached: every call stats the path again.
 */

use std::fs;
use std::os::unix::fs::{chown, MetadataExt, PermissionsExt};
use std::path::Path;

use filetime::{set_file_times, FileTime};
use tracing::debug;

use crate::error::{IoResultExt, Result};

/// Snapshot of the metadata mirrored for every entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Last modification time
    pub modified: FileTime,
    /// Last access time
    pub accessed: FileTime,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Raw `st_mode`, file type bits included
    pub mode: u32,
}

impl EntryMetadata {
    /// Build a snapshot from already fetched metadata
    pub fn from_fs(metadata: &fs::Metadata) -> Self {
        Self {
            modified: FileTime::from_last_modification_time(metadata),
            accessed: FileTime::from_last_access_time(metadata),
            uid: metadata.uid(),
            gid: metadata.gid(),
            mode: metadata.mode(),
        }
    }

    /// Permission bits only (including setuid, setgid and sticky)
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Capture the metadata of `path`, following symlinks
pub fn read_metadata(path: &Path) -> Result<EntryMetadata> {
    let metadata = fs::metadata(path).at("read metadata of", path)?;
    Ok(EntryMetadata::from_fs(&metadata))
}

/// Apply `metadata` to `path`
///
/// Times go first, then ownership, then the mode. Changing the mode last keeps
/// a more permissive mode from becoming visible earlier than necessary.
pub fn apply_metadata(path: &Path, metadata: &EntryMetadata) -> Result<()> {
    set_file_times(path, metadata.accessed, metadata.modified).at("set times on", path)?;
    chown(path, Some(metadata.uid), Some(metadata.gid)).at("set owner of", path)?;
    fs::set_permissions(path, fs::Permissions::from_mode(metadata.permissions()))
        .at("set permissions of", path)?;
    Ok(())
}

/// Copy the metadata of `source` onto `destination`
pub fn copy_metadata(source: &Path, destination: &Path) -> Result<()> {
    debug!(
        "Copying metadata {} to {}",
        source.display(),
        destination.display()
    );
    let metadata = read_metadata(source)?;
    apply_metadata(destination, &metadata)
}
