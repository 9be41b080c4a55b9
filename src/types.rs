/*!
 * Core types and data structures for mirrorsync
 */

use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Represents different types of filesystem entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory containing other entries
    Directory,
    /// Symbolic link (never followed)
    Symlink,
    /// Fifos, sockets, devices
    Other,
}

impl EntryKind {
    /// Classify a file type obtained without following symlinks
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Other => "special file",
        };
        f.write_str(name)
    }
}

/// A unit of work for the copy pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyJob {
    /// Transfer the full content of `source` to `destination`, then its metadata
    Copy {
        /// Source file
        source: PathBuf,
        /// Mirrored destination file
        destination: PathBuf,
    },
    /// Stop the worker that claims this job
    Terminate,
}

/// The action the reconciler took for one source entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Destination directory was created
    CreatedDirectory,
    /// Destination symlink was created
    CreatedSymlink,
    /// Destination symlink pointed elsewhere and was recreated
    ReplacedSymlink,
    /// A copy job was queued for the file
    QueuedCopy,
    /// Only metadata was copied onto the existing destination
    SyncedMetadata,
    /// Destination already mirrors the source
    Unchanged,
    /// Entry kind is not mirrored
    Skipped,
}
