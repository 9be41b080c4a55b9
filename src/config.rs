/*!
 * Configuration handling for mirrorsync
 */

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use clap_complete::Shell;

use crate::error::Result;
use crate::utils::resolve_nonexistent;
use crate::{bail, ensure};

/// Default number of copy workers
pub const DEFAULT_THREADS: usize = 1;

/// Default block size for content comparison
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// What to do when the source tree cannot be fully walked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TraversalPolicy {
    /// Stop the run on the first traversal error (default)
    #[default]
    Abort,
    /// Log the error, count it and keep walking
    Continue,
}

/// Command-line arguments for mirrorsync
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "mirrorsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Mirror a directory tree, copying only changed files",
    long_about = "Makes DESTINATION a structural and metadata mirror of SOURCE. Files are copied whole when their size differs; entries whose metadata differs only get their metadata updated. Nothing is ever deleted from DESTINATION unless it has to be replaced by an entry of another type."
)]
pub struct Args {
    /// Source directory to mirror
    #[clap(required_unless_present = "generate")]
    pub source: Option<PathBuf>,

    /// Destination directory (created if missing)
    #[clap(required_unless_present = "generate")]
    pub destination: Option<PathBuf>,

    /// Number of concurrent copy workers
    #[clap(long, default_value_t = DEFAULT_THREADS)]
    pub threads: usize,

    /// Block size in bytes used when comparing file contents
    #[clap(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// What to do when part of the source tree cannot be read
    #[clap(long, value_enum, default_value_t = TraversalPolicy::default())]
    pub on_traversal_error: TraversalPolicy,

    /// Compare file contents of source and destination after syncing
    #[clap(long)]
    pub verify: bool,

    /// Only log warnings and errors, and skip the summary table
    #[clap(long, short)]
    pub quiet: bool,

    /// Generate shell completions
    #[clap(long = "generate", value_enum)]
    pub generate: Option<Shell>,
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Root of the tree to mirror
    pub source: PathBuf,

    /// Root of the mirror
    pub destination: PathBuf,

    /// Number of copy workers
    pub threads: usize,

    /// Block size for content comparison
    pub chunk_size: usize,

    /// Handling of traversal errors
    pub traversal_policy: TraversalPolicy,

    /// Run the content verification pass after syncing
    pub verify: bool,

    /// Suppress progress logging and the summary
    pub quiet: bool,
}

impl Config {
    /// Configuration with defaults for the given roots
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            threads: DEFAULT_THREADS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            traversal_policy: TraversalPolicy::default(),
            verify: false,
            quiet: false,
        }
    }

    /// Create configuration from command-line arguments
    pub fn from_args(args: Args) -> Self {
        Self {
            source: args.source.unwrap_or_default(),
            destination: args.destination.unwrap_or_default(),
            threads: args.threads,
            chunk_size: args.chunk_size,
            traversal_policy: args.on_traversal_error,
            verify: args.verify,
            quiet: args.quiet,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.source.as_os_str().is_empty(),
            Config,
            "Source directory is required"
        );
        ensure!(
            !self.destination.as_os_str().is_empty(),
            Config,
            "Destination directory is required"
        );
        ensure!(
            self.source.is_dir(),
            Config,
            "Source directory not found: {}",
            self.source.display()
        );
        ensure!(
            self.threads >= 1,
            Config,
            "Thread count must be at least 1"
        );
        ensure!(
            self.chunk_size > 0,
            Config,
            "Chunk size must be greater than 0"
        );

        if let Ok(meta) = fs::symlink_metadata(&self.destination) {
            ensure!(
                meta.is_dir(),
                Config,
                "Destination exists and is not a directory: {}",
                self.destination.display()
            );
        }

        // Mirroring into the source tree would walk its own output
        let source = fs::canonicalize(&self.source)?;
        if let Some(destination) = resolve_nonexistent(&self.destination) {
            if destination.starts_with(&source) {
                bail!(
                    Config,
                    "Destination {} lies inside source {}",
                    self.destination.display(),
                    self.source.display()
                );
            }
        }

        Ok(())
    }
}
