/*!
 * Source tree traversal driving a synchronization run
 */

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::compare::equal_metadata;
use crate::config::{Config, TraversalPolicy};
use crate::error::{Result, SyncError};
use crate::metadata::copy_metadata;
use crate::pipeline::CopyPool;
use crate::reconciler::Reconciler;
use crate::report::{SharedStatistics, SyncReport};
use crate::types::EntryKind;
use crate::utils::TreeRoots;

/// Runs one full synchronization of a source tree onto a destination
pub struct Synchronizer {
    config: Config,
    roots: TreeRoots,
    statistics: SharedStatistics,
}

impl Synchronizer {
    /// Create a synchronizer for the roots in `config`
    pub fn new(config: Config) -> Self {
        let roots = TreeRoots::new(&config.source, &config.destination);
        Self {
            config,
            roots,
            statistics: SharedStatistics::default(),
        }
    }

    /// Walk the source tree, reconcile every entry and wait for all copies
    ///
    /// Under [`TraversalPolicy::Abort`] the first traversal error ends the
    /// walk; queued copies still finish before the error is returned.
    pub fn run(&self) -> Result<SyncReport> {
        let start = Instant::now();
        info!(
            "Synchronizing {} -> {}",
            self.roots.source().display(),
            self.roots.destination().display()
        );

        let pool = CopyPool::spawn(self.config.threads, self.statistics.clone())?;
        let mut directories = Vec::new();
        let walked = {
            let reconciler = Reconciler::new(&self.roots, pool.sender(), &self.statistics);
            self.walk(&reconciler, &mut directories)
        };

        debug!("Traversal finished, stopping {} copy workers", pool.size());
        let stopped = pool.shutdown();
        self.restore_directory_metadata(&directories);
        walked?;
        stopped?;

        Ok(SyncReport {
            source: self.config.source.clone(),
            destination: self.config.destination.clone(),
            duration: start.elapsed(),
            statistics: self.statistics.snapshot(),
        })
    }

    fn walk(&self, reconciler: &Reconciler<'_>, directories: &mut Vec<PathBuf>) -> Result<()> {
        for entry in WalkDir::new(self.roots.source()) {
            let (entry, metadata) = match entry.and_then(|e| e.metadata().map(|m| (e, m))) {
                Ok(visited) => visited,
                Err(e) => {
                    self.on_traversal_error(e)?;
                    continue;
                }
            };

            let path = entry.path();
            let kind = EntryKind::from_file_type(entry.file_type());
            debug!("Checking: {}", path.display());
            self.statistics.record(|s| s.entries_visited += 1);

            match reconciler.reconcile(path, kind, &metadata) {
                Ok(action) => {
                    self.statistics.record(|s| s.tally(action));
                    if kind == EntryKind::Directory {
                        directories.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    error!("Failed to sync {}: {}", path.display(), e);
                    self.statistics.record(|s| s.errors += 1);
                }
            }
        }
        Ok(())
    }

    fn on_traversal_error(&self, err: walkdir::Error) -> Result<()> {
        match self.config.traversal_policy {
            TraversalPolicy::Abort => {
                error!("Aborting: {}", err);
                Err(SyncError::Traversal(err))
            }
            TraversalPolicy::Continue => {
                warn!("Skipping unreadable entry: {}", err);
                self.statistics.record(|s| s.traversal_errors += 1);
                Ok(())
            }
        }
    }

    // Populating a directory bumps its mtime after it was synced, and mirrored
    // directories keep owner access while the walk runs. Redo directories
    // deepest first once every copy has landed.
    fn restore_directory_metadata(&self, directories: &[PathBuf]) {
        for source in directories.iter().rev() {
            let restored = self.roots.destination_for(source).and_then(|destination| {
                if equal_metadata(source, &destination)? {
                    return Ok(false);
                }
                copy_metadata(source, &destination)?;
                Ok(true)
            });

            match restored {
                Ok(true) => debug!("Restored directory metadata: {}", source.display()),
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to restore metadata of {}: {}", source.display(), e);
                    self.statistics.record(|s| s.errors += 1);
                }
            }
        }
    }
}

/// Synchronize `config.source` onto `config.destination`
pub fn synchronize(config: Config) -> Result<SyncReport> {
    Synchronizer::new(config).run()
}
