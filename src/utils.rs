/*!
 * Utility functions for mirrorsync
 */

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Source and destination roots of a run
///
/// Maps source paths onto the destination tree by stripping the source root
/// as a path prefix, never by substring replacement.
#[derive(Debug, Clone)]
pub struct TreeRoots {
    source: PathBuf,
    destination: PathBuf,
    canonical_source: Option<PathBuf>,
    absolute_destination: PathBuf,
}

impl TreeRoots {
    /// Create the mapping for a source and destination root
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let destination = destination.into();
        let canonical_source = fs::canonicalize(&source)
            .ok()
            .filter(|canonical| *canonical != source);
        // Rewritten link targets must not depend on the working directory
        let absolute_destination = if destination.is_absolute() {
            destination.clone()
        } else {
            resolve_nonexistent(&destination).unwrap_or_else(|| destination.clone())
        };
        Self {
            source,
            destination,
            canonical_source,
            absolute_destination,
        }
    }

    /// Source root as given
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination root as given
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Mirrored destination path for a path under the source root
    pub fn destination_for(&self, source_path: &Path) -> Result<PathBuf> {
        let relative = source_path.strip_prefix(&self.source).map_err(|_| {
            SyncError::PathMapping(format!(
                "{} is not under source root {}",
                source_path.display(),
                self.source.display()
            ))
        })?;

        if relative.as_os_str().is_empty() {
            Ok(self.destination.clone())
        } else {
            Ok(self.destination.join(relative))
        }
    }

    /// Rewrite an absolute symlink target that points into the source tree
    ///
    /// Relative targets and targets outside the source root are kept verbatim.
    /// Rewritten targets are always absolute, even when the roots were given
    /// relative to the working directory.
    pub fn rewrite_link_target(&self, target: &Path) -> PathBuf {
        if !target.is_absolute() {
            return target.to_path_buf();
        }

        let roots = std::iter::once(&self.source).chain(self.canonical_source.as_ref());
        for root in roots {
            if let Ok(relative) = target.strip_prefix(root) {
                if relative.as_os_str().is_empty() {
                    return self.absolute_destination.clone();
                }
                return self.absolute_destination.join(relative);
            }
        }
        target.to_path_buf()
    }
}

/// Canonicalize a path that may not exist yet through its nearest existing ancestor
pub fn resolve_nonexistent(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = fs::canonicalize(current) {
            return Some(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        missing.push(current.file_name()?.to_os_string());
        current = match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
    }
}

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
