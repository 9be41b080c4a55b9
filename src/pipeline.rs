/*!
 * Copy pipeline: a fixed pool of workers draining a bounded job queue
 */

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::{IoResultExt, Result, SyncError};
use crate::metadata::copy_metadata;
use crate::report::SharedStatistics;
use crate::types::CopyJob;

/// Queue slots per worker
pub const QUEUE_DEPTH_PER_WORKER: usize = 10;

/// Pool of copy workers fed through a bounded queue
pub struct CopyPool {
    sender: Sender<CopyJob>,
    workers: Vec<JoinHandle<()>>,
}

impl CopyPool {
    /// Spawn `threads` workers sharing one queue of `threads * QUEUE_DEPTH_PER_WORKER` slots
    pub fn spawn(threads: usize, stats: SharedStatistics) -> Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = bounded(threads * QUEUE_DEPTH_PER_WORKER);

        let mut workers = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            let receiver = receiver.clone();
            let stats = stats.clone();
            let handle = thread::Builder::new()
                .name(format!("copy-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, receiver, stats))?;
            workers.push(handle);
        }

        Ok(Self { sender, workers })
    }

    /// Number of workers in the pool
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job, blocking while the queue is full
    pub fn submit(&self, job: CopyJob) -> Result<()> {
        submit(&self.sender, job)
    }

    /// Sending half of the job queue
    pub fn sender(&self) -> &Sender<CopyJob> {
        &self.sender
    }

    /// Send one termination job per worker and wait for all of them to exit
    ///
    /// Jobs queued before the shutdown are still processed.
    pub fn shutdown(self) -> Result<()> {
        for _ in 0..self.workers.len() {
            self.submit(CopyJob::Terminate)?;
        }

        let mut panicked = 0;
        for handle in self.workers {
            if handle.join().is_err() {
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(SyncError::Worker(format!(
                "{panicked} copy worker(s) panicked"
            )));
        }
        Ok(())
    }
}

/// Send `job` on a pipeline queue
pub fn submit(sender: &Sender<CopyJob>, job: CopyJob) -> Result<()> {
    sender
        .send(job)
        .map_err(|e| SyncError::PipelineClosed(format!("no worker left to take {:?}", e.0)))
}

fn run_worker(worker_id: usize, jobs: Receiver<CopyJob>, stats: SharedStatistics) {
    debug!("Copy worker {} started", worker_id);

    // A disconnected queue means the controller is gone; stop like on Terminate
    while let Ok(job) = jobs.recv() {
        let (source, destination) = match job {
            CopyJob::Copy {
                source,
                destination,
            } => (source, destination),
            CopyJob::Terminate => break,
        };

        info!("Copying {} to {}", source.display(), destination.display());
        match execute_copy(&source, &destination) {
            Ok(bytes) => stats.record(|s| {
                s.files_copied += 1;
                s.bytes_copied += bytes;
            }),
            Err(e) => {
                warn!("Abandoning copy of {}: {}", source.display(), e);
                stats.record(|s| s.copy_failures += 1);
            }
        }
    }

    debug!("Copy worker {} stopped", worker_id);
}

/// Copy the full content of `source` to `destination`, then its metadata
///
/// The data is synced to disk before any metadata is applied.
pub fn execute_copy(source: &Path, destination: &Path) -> Result<u64> {
    let bytes = copy_file_data(source, destination)?;
    copy_metadata(source, destination)?;
    Ok(bytes)
}

fn copy_file_data(source: &Path, destination: &Path) -> Result<u64> {
    let mut input = File::open(source).at("open", source)?;
    let mut output = create_destination(destination)?;

    let bytes = io::copy(&mut input, &mut output).at("write", destination)?;
    output.sync_all().at("sync", destination)?;
    Ok(bytes)
}

// A mirrored read-only file cannot be truncated in place, so it is unlinked first
fn create_destination(destination: &Path) -> Result<File> {
    match File::create(destination) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && destination.is_file() => {
            debug!(
                "Replacing read-only destination {}",
                destination.display()
            );
            fs::remove_file(destination).at("remove", destination)?;
            File::create(destination).at("create", destination)
        }
        Err(e) => Err(e).at("create", destination),
    }
}
