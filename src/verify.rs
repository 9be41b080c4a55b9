/*!
 * Post-sync content verification
 *
 * Walks the source tree and compares every regular file with its mirror,
 * first by size and then byte for byte. Comparisons run on the rayon pool.
 */

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::compare::{equal_content, equal_size};
use crate::config::{Config, TraversalPolicy};
use crate::error::Result;
use crate::utils::TreeRoots;

/// Outcome of a verification pass
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Number of file pairs compared
    pub files_checked: usize,
    /// Source files whose mirror differs or is missing
    pub mismatched: Vec<PathBuf>,
    /// Source files whose comparison could not be completed
    pub failed: Vec<(PathBuf, String)>,
}

impl VerifyReport {
    /// True when every file matched
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty() && self.failed.is_empty()
    }
}

/// Compare every regular file under `config.source` with its mirror
///
/// Unreadable parts of the source tree end verification under
/// [`TraversalPolicy::Abort`] and are listed in [`VerifyReport::failed`]
/// otherwise.
pub fn verify_tree(config: &Config) -> Result<VerifyReport> {
    let roots = TreeRoots::new(&config.source, &config.destination);

    let mut pairs = Vec::new();
    let mut unreadable = Vec::new();
    for entry in WalkDir::new(roots.source()) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if config.traversal_policy == TraversalPolicy::Continue => {
                let path = e.path().unwrap_or(roots.source()).to_path_buf();
                warn!("Could not verify {}: {}", path.display(), e);
                unreadable.push((path, e.to_string()));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if entry.file_type().is_file() {
            let destination = roots.destination_for(entry.path())?;
            pairs.push((entry.into_path(), destination));
        }
    }

    info!("Verifying {} files", pairs.len());
    let outcomes: Vec<(PathBuf, Result<bool>)> = pairs
        .par_iter()
        .map(|(source, destination)| {
            let outcome = verify_pair(source, destination, config.chunk_size);
            (source.clone(), outcome)
        })
        .collect();

    let mut report = VerifyReport {
        files_checked: outcomes.len(),
        failed: unreadable,
        ..Default::default()
    };
    for (source, outcome) in outcomes {
        match outcome {
            Ok(true) => {}
            Ok(false) => {
                warn!("Content differs: {}", source.display());
                report.mismatched.push(source);
            }
            Err(e) => {
                warn!("Could not verify {}: {}", source.display(), e);
                report.failed.push((source, e.to_string()));
            }
        }
    }
    report.mismatched.sort();
    report.failed.sort();

    Ok(report)
}

fn verify_pair(source: &Path, destination: &Path, chunk_size: usize) -> Result<bool> {
    if !equal_size(source, destination)? {
        return Ok(false);
    }
    equal_content(source, destination, chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::tempdir;

    use crate::error::SyncError;

    #[test]
    fn test_verify_reports_differences() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let destination = dir.path().join("dst");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::create_dir_all(destination.join("sub")).unwrap();

        fs::write(source.join("same.txt"), b"identical").unwrap();
        fs::write(destination.join("same.txt"), b"identical").unwrap();
        fs::write(source.join("sub/flipped.txt"), b"abcdef").unwrap();
        fs::write(destination.join("sub/flipped.txt"), b"abcdeX").unwrap();
        fs::write(source.join("missing.txt"), b"only in source").unwrap();

        let mut config = Config::new(&source, &destination);
        config.chunk_size = 2;
        let report = verify_tree(&config).unwrap();

        assert_eq!(report.files_checked, 3);
        assert_eq!(
            report.mismatched,
            vec![source.join("missing.txt"), source.join("sub/flipped.txt")]
        );
        assert!(report.failed.is_empty());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_verify_clean_tree() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let destination = dir.path().join("dst");
        fs::create_dir(&source).unwrap();
        fs::create_dir(&destination).unwrap();
        fs::write(source.join("a"), b"a").unwrap();
        fs::write(destination.join("a"), b"a").unwrap();

        let report = verify_tree(&Config::new(&source, &destination)).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.files_checked, 1);
    }

    #[test]
    fn test_verify_unreadable_directory_follows_policy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        let destination = dir.path().join("dst");
        let locked = source.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::create_dir(&destination).unwrap();
        fs::write(source.join("a"), b"a").unwrap();
        fs::write(destination.join("a"), b"a").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the permission bits
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut config = Config::new(&source, &destination);
        let aborted = verify_tree(&config);

        config.traversal_policy = TraversalPolicy::Continue;
        let report = verify_tree(&config);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(aborted, Err(SyncError::Traversal(_))));
        let report = report.unwrap();
        assert_eq!(report.files_checked, 1);
        assert!(report.mismatched.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, locked);
        assert!(!report.is_clean());
    }
}
