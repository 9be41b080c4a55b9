/*!
 * Per-entry reconciliation of the destination tree
 *
 * For every source entry the reconciler takes exactly one action on the
 * mirrored destination path. Content copies are handed to the copy pipeline;
 * everything else happens synchronously.
 */

use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::{symlink, DirBuilderExt, PermissionsExt};
use std::path::Path;

use crossbeam_channel::Sender;
use tracing::{debug, info};

use crate::compare::{equal_metadata, equal_size};
use crate::error::{IoResultExt, Result};
use crate::metadata::{apply_metadata, copy_metadata, read_metadata};
use crate::pipeline::submit;
use crate::report::SharedStatistics;
use crate::types::{Action, CopyJob, EntryKind};
use crate::utils::TreeRoots;

/// Owner bits a mirrored directory keeps until the walk is done with it
const OWNER_ACCESS: u32 = 0o700;

/// Decides and performs the action each source entry requires
pub struct Reconciler<'a> {
    roots: &'a TreeRoots,
    jobs: &'a Sender<CopyJob>,
    stats: &'a SharedStatistics,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler that queues content copies on `jobs`
    pub fn new(
        roots: &'a TreeRoots,
        jobs: &'a Sender<CopyJob>,
        stats: &'a SharedStatistics,
    ) -> Self {
        Self { roots, jobs, stats }
    }

    /// Bring the destination counterpart of `source` in line with it
    ///
    /// `kind` and `metadata` must come from the source entry without following
    /// symlinks.
    pub fn reconcile(
        &self,
        source: &Path,
        kind: EntryKind,
        metadata: &fs::Metadata,
    ) -> Result<Action> {
        let destination = self.roots.destination_for(source)?;

        let mut exists = false;
        if let Some(existing) = entry_kind(&destination)? {
            if existing == kind {
                exists = true;
            } else {
                info!(
                    "Removing destination {}, {} replaced by {}",
                    destination.display(),
                    existing,
                    kind
                );
                remove_entry(&destination, existing)?;
                self.stats.record(|s| s.entries_removed += 1);
            }
        }

        match kind {
            EntryKind::Directory => self.sync_directory(source, &destination, metadata, exists),
            EntryKind::Symlink => self.sync_symlink(source, &destination, exists),
            EntryKind::File => self.sync_file(source, &destination, exists),
            EntryKind::Other => {
                info!("Skipping {} {}", kind, source.display());
                Ok(Action::Skipped)
            }
        }
    }

    fn sync_directory(
        &self,
        source: &Path,
        destination: &Path,
        metadata: &fs::Metadata,
        exists: bool,
    ) -> Result<Action> {
        // The exact mode is restored once the walk and all copies are done,
        // until then children must be creatable
        if !exists {
            info!("Creating directory: {}", destination.display());
            DirBuilder::new()
                .recursive(true)
                .mode((metadata.permissions().mode() & 0o7777) | OWNER_ACCESS)
                .create(destination)
                .at("create directory", destination)?;
            let mut wanted = read_metadata(source)?;
            wanted.mode |= OWNER_ACCESS;
            apply_metadata(destination, &wanted)?;
            return Ok(Action::CreatedDirectory);
        }

        let action = sync_metadata_only(source, destination)?;
        grant_owner_access(destination)?;
        Ok(action)
    }

    fn sync_symlink(&self, source: &Path, destination: &Path, exists: bool) -> Result<Action> {
        let target = fs::read_link(source).at("read link", source)?;
        let expected = self.roots.rewrite_link_target(&target);

        if !exists {
            info!(
                "Creating symlink: {} -> {}",
                destination.display(),
                expected.display()
            );
            symlink(&expected, destination).at("create symlink", destination)?;
            return Ok(Action::CreatedSymlink);
        }

        let current = fs::read_link(destination).at("read link", destination)?;
        if current == expected {
            return Ok(Action::Unchanged);
        }

        info!(
            "Replacing symlink: {} -> {} (was {})",
            destination.display(),
            expected.display(),
            current.display()
        );
        fs::remove_file(destination).at("remove symlink", destination)?;
        symlink(&expected, destination).at("create symlink", destination)?;
        Ok(Action::ReplacedSymlink)
    }

    fn sync_file(&self, source: &Path, destination: &Path, exists: bool) -> Result<Action> {
        if !exists || !equal_size(source, destination)? {
            debug!("Queueing copy of {}", source.display());
            submit(
                self.jobs,
                CopyJob::Copy {
                    source: source.to_path_buf(),
                    destination: destination.to_path_buf(),
                },
            )?;
            return Ok(Action::QueuedCopy);
        }

        // Same size is taken as same content
        sync_metadata_only(source, destination)
    }
}

fn sync_metadata_only(source: &Path, destination: &Path) -> Result<Action> {
    if equal_metadata(source, destination)? {
        return Ok(Action::Unchanged);
    }

    info!("Updating metadata: {}", destination.display());
    copy_metadata(source, destination)?;
    Ok(Action::SyncedMetadata)
}

/// Kind of the entry at `path` without following symlinks, `None` if absent
fn entry_kind(path: &Path) -> Result<Option<EntryKind>> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(EntryKind::from_file_type(metadata.file_type()))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).at("stat", path),
    }
}

fn grant_owner_access(directory: &Path) -> Result<()> {
    let mode = fs::metadata(directory)
        .at("stat", directory)?
        .permissions()
        .mode();
    if mode & OWNER_ACCESS == OWNER_ACCESS {
        return Ok(());
    }

    debug!("Opening {} for writing", directory.display());
    fs::set_permissions(
        directory,
        fs::Permissions::from_mode((mode & 0o7777) | OWNER_ACCESS),
    )
    .at("set permissions of", directory)
}

fn remove_entry(path: &Path, kind: EntryKind) -> Result<()> {
    match kind {
        EntryKind::Directory => fs::remove_dir_all(path).at("remove directory", path),
        _ => fs::remove_file(path).at("remove", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crossbeam_channel::{unbounded, Receiver};
    use filetime::{set_file_times, FileTime};
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        source: PathBuf,
        destination: PathBuf,
        roots: TreeRoots,
        sender: Sender<CopyJob>,
        receiver: Receiver<CopyJob>,
        stats: SharedStatistics,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            let source = dir.path().join("src");
            let destination = dir.path().join("dst");
            fs::create_dir(&source).unwrap();
            fs::create_dir(&destination).unwrap();
            let roots = TreeRoots::new(&source, &destination);
            let (sender, receiver) = unbounded();
            Self {
                _dir: dir,
                source,
                destination,
                roots,
                sender,
                receiver,
                stats: SharedStatistics::default(),
            }
        }

        fn reconcile(&self, relative: &str) -> Result<Action> {
            let reconciler = Reconciler::new(&self.roots, &self.sender, &self.stats);
            let path = self.source.join(relative);
            let metadata = fs::symlink_metadata(&path).unwrap();
            let kind = EntryKind::from_file_type(metadata.file_type());
            reconciler.reconcile(&path, kind, &metadata)
        }
    }

    #[test]
    fn test_size_change_queues_copy_for_exact_pair() {
        let fx = Fixture::new();
        fs::write(fx.source.join("a.txt"), b"0123456789").unwrap();
        fs::write(fx.destination.join("a.txt"), b"01234").unwrap();

        assert_eq!(fx.reconcile("a.txt").unwrap(), Action::QueuedCopy);
        assert_eq!(
            fx.receiver.try_recv().unwrap(),
            CopyJob::Copy {
                source: fx.source.join("a.txt"),
                destination: fx.destination.join("a.txt"),
            }
        );
        assert!(fx.receiver.try_recv().is_err());
    }

    #[test]
    fn test_missing_file_queues_copy() {
        let fx = Fixture::new();
        fs::write(fx.source.join("new.txt"), b"").unwrap();

        assert_eq!(fx.reconcile("new.txt").unwrap(), Action::QueuedCopy);
        assert_eq!(fx.receiver.len(), 1);
    }

    #[test]
    fn test_same_size_different_metadata_syncs_metadata_only() {
        let fx = Fixture::new();
        let source = fx.source.join("a.txt");
        let destination = fx.destination.join("a.txt");
        fs::write(&source, b"abc").unwrap();
        fs::write(&destination, b"xyz").unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o600)).unwrap();
        set_file_times(
            &source,
            FileTime::from_unix_time(1_400_000_000, 0),
            FileTime::from_unix_time(1_400_000_000, 0),
        )
        .unwrap();

        assert_eq!(fx.reconcile("a.txt").unwrap(), Action::SyncedMetadata);
        assert!(fx.receiver.is_empty());
        assert_eq!(
            read_metadata(&destination).unwrap(),
            read_metadata(&source).unwrap()
        );
        assert_eq!(fx.reconcile("a.txt").unwrap(), Action::Unchanged);

        // Content is not touched on a metadata-only update
        assert_eq!(fs::read(&destination).unwrap(), b"xyz");
    }

    #[test]
    fn test_directory_created_then_unchanged() {
        let fx = Fixture::new();
        let source = fx.source.join("d");
        fs::create_dir(&source).unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o750)).unwrap();

        assert_eq!(fx.reconcile("d").unwrap(), Action::CreatedDirectory);
        let created = read_metadata(&fx.destination.join("d")).unwrap();
        assert_eq!(created.permissions(), 0o750);
        assert_eq!(fx.reconcile("d").unwrap(), Action::Unchanged);
    }

    #[test]
    fn test_read_only_directory_stays_writable_during_walk() {
        let fx = Fixture::new();
        let source = fx.source.join("ro");
        fs::create_dir(&source).unwrap();
        fs::set_permissions(&source, fs::Permissions::from_mode(0o555)).unwrap();

        assert_eq!(fx.reconcile("ro").unwrap(), Action::CreatedDirectory);
        let created = fx.destination.join("ro");
        assert_eq!(read_metadata(&created).unwrap().permissions(), 0o755);
        fs::write(created.join("child"), b"x").unwrap();

        // An existing mirror that already carries the exact mode is reopened
        fs::set_permissions(&created, fs::Permissions::from_mode(0o555)).unwrap();
        fx.reconcile("ro").unwrap();
        assert_eq!(read_metadata(&created).unwrap().permissions(), 0o755);

        fs::set_permissions(&source, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_type_mismatch_removes_destination_first() {
        let fx = Fixture::new();
        fs::create_dir(fx.source.join("p")).unwrap();
        fs::write(fx.destination.join("p"), b"old file content").unwrap();

        assert_eq!(fx.reconcile("p").unwrap(), Action::CreatedDirectory);
        assert!(fx.destination.join("p").is_dir());
        assert_eq!(fx.stats.snapshot().entries_removed, 1);
    }

    #[test]
    fn test_type_mismatch_removes_whole_directory_subtree() {
        let fx = Fixture::new();
        fs::write(fx.source.join("p"), b"now a file").unwrap();
        fs::create_dir_all(fx.destination.join("p/nested/deeper")).unwrap();
        fs::write(fx.destination.join("p/nested/deeper/f"), b"x").unwrap();

        assert_eq!(fx.reconcile("p").unwrap(), Action::QueuedCopy);
        assert!(!fx.destination.join("p").exists());
    }

    #[test]
    fn test_symlink_created_with_rewritten_target() {
        let fx = Fixture::new();
        symlink(fx.source.join("a/b"), fx.source.join("abs")).unwrap();
        symlink("f.txt", fx.source.join("rel")).unwrap();

        assert_eq!(fx.reconcile("abs").unwrap(), Action::CreatedSymlink);
        assert_eq!(fx.reconcile("rel").unwrap(), Action::CreatedSymlink);
        assert_eq!(
            fs::read_link(fx.destination.join("abs")).unwrap(),
            fx.destination.join("a/b")
        );
        assert_eq!(
            fs::read_link(fx.destination.join("rel")).unwrap(),
            PathBuf::from("f.txt")
        );

        assert_eq!(fx.reconcile("abs").unwrap(), Action::Unchanged);
    }

    #[test]
    fn test_symlink_with_stale_target_is_replaced() {
        let fx = Fixture::new();
        symlink("new-target", fx.source.join("link")).unwrap();
        symlink("old-target", fx.destination.join("link")).unwrap();

        assert_eq!(fx.reconcile("link").unwrap(), Action::ReplacedSymlink);
        assert_eq!(
            fs::read_link(fx.destination.join("link")).unwrap(),
            PathBuf::from("new-target")
        );
    }

    #[test]
    fn test_closed_pipeline_is_an_error() {
        let fx = Fixture::new();
        fs::write(fx.source.join("a.txt"), b"abc").unwrap();
        let (sender, receiver) = unbounded::<CopyJob>();
        drop(receiver);

        let reconciler = Reconciler::new(&fx.roots, &sender, &fx.stats);
        let path = fx.source.join("a.txt");
        let metadata = fs::symlink_metadata(&path).unwrap();
        let err = reconciler
            .reconcile(&path, EntryKind::File, &metadata)
            .unwrap_err();
        assert!(err.to_string().starts_with("Copy pipeline closed"));
    }
}
