/*!
 * mirrorsync - One-way directory tree mirroring
 *
 * This library makes a destination tree a structural and metadata mirror of
 * a source tree, copying whole files only when their size changed.
 */

pub mod compare;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod types;
pub mod utils;
pub mod verify;
pub mod walker;


// Re-export main components for easier access
pub use config::{Config, TraversalPolicy};
pub use error::{Result, SyncError};
pub use metadata::EntryMetadata;
pub use report::{ReportFormat, Reporter, SyncReport, SyncStatistics};
pub use types::{Action, CopyJob, EntryKind};
pub use verify::{verify_tree, VerifyReport};
pub use walker::{synchronize, Synchronizer};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
