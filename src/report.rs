/*!
 * Run statistics and reporting for mirrorsync
 *
 * Statistics are shared between the walker and the copy workers. The final
 * report is rendered with the tabled library.
 */

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::types::Action;
use crate::utils::format_file_size;

/// Counters collected over one synchronization run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatistics {
    /// Source entries handed to the reconciler
    pub entries_visited: usize,
    /// Destination directories created
    pub directories_created: usize,
    /// Destination symlinks created
    pub symlinks_created: usize,
    /// Destination symlinks recreated with a new target
    pub symlinks_replaced: usize,
    /// Destination entries removed because their type differed
    pub entries_removed: usize,
    /// Copy jobs sent to the pipeline
    pub copies_queued: usize,
    /// Files whose content was copied
    pub files_copied: usize,
    /// Bytes written by the copy workers
    pub bytes_copied: u64,
    /// Entries that only needed their metadata copied
    pub metadata_synced: usize,
    /// Entries already mirrored
    pub unchanged: usize,
    /// Entries of a kind that is not mirrored
    pub skipped: usize,
    /// Best-effort reconciliation failures
    pub errors: usize,
    /// Copy jobs abandoned after an I/O error
    pub copy_failures: usize,
    /// Traversal errors tolerated under the continue policy
    pub traversal_errors: usize,
}

impl SyncStatistics {
    /// Count one reconciler decision
    pub fn tally(&mut self, action: Action) {
        match action {
            Action::CreatedDirectory => self.directories_created += 1,
            Action::CreatedSymlink => self.symlinks_created += 1,
            Action::ReplacedSymlink => self.symlinks_replaced += 1,
            Action::QueuedCopy => self.copies_queued += 1,
            Action::SyncedMetadata => self.metadata_synced += 1,
            Action::Unchanged => self.unchanged += 1,
            Action::Skipped => self.skipped += 1,
        }
    }

    /// Total number of failures of any kind
    pub fn failures(&self) -> usize {
        self.errors + self.copy_failures + self.traversal_errors
    }
}

/// Statistics handle shared across threads
#[derive(Debug, Clone, Default)]
pub struct SharedStatistics(Arc<Mutex<SyncStatistics>>);

impl SharedStatistics {
    /// Update the counters
    pub fn record<F: FnOnce(&mut SyncStatistics)>(&self, update: F) {
        let mut stats = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> SyncStatistics {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Outcome of a synchronization run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Source root
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// Wall time of the run
    pub duration: Duration,
    /// Counters collected during the run
    pub statistics: SyncStatistics,
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for sync results
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Generate a report string for a finished run
    pub fn generate_report(&self, report: &SyncReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.generate_console_report(report),
        }
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &SyncReport) {
        println!("\n{}", self.generate_report(report));
    }

    // Create a summary table using the tabled crate
    fn create_summary_table(&self, report: &SyncReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: &'static str,

            #[tabled(rename = "Value")]
            value: String,
        }

        let stats = &report.statistics;
        let row = |key, value: usize| SummaryRow {
            key,
            value: value.to_string(),
        };

        let rows = vec![
            SummaryRow {
                key: "Source",
                value: report.source.display().to_string(),
            },
            SummaryRow {
                key: "Destination",
                value: report.destination.display().to_string(),
            },
            SummaryRow {
                key: "Process Time",
                value: format!("{:.4?}", report.duration),
            },
            row("Entries Checked", stats.entries_visited),
            row("Directories Created", stats.directories_created),
            row("Symlinks Created", stats.symlinks_created),
            row("Symlinks Replaced", stats.symlinks_replaced),
            row("Entries Replaced (type)", stats.entries_removed),
            row("Copies Queued", stats.copies_queued),
            row("Files Copied", stats.files_copied),
            SummaryRow {
                key: "Data Copied",
                value: format_file_size(stats.bytes_copied),
            },
            row("Metadata Updated", stats.metadata_synced),
            row("Unchanged", stats.unchanged),
            row("Skipped", stats.skipped),
            row("Errors", stats.errors),
            row("Failed Copies", stats.copy_failures),
            row("Traversal Errors", stats.traversal_errors),
        ];

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    // Generate a console table report
    fn generate_console_report(&self, report: &SyncReport) -> String {
        let title = if report.statistics.failures() == 0 {
            "SYNC COMPLETE"
        } else {
            "SYNC COMPLETE WITH ERRORS"
        };

        format!("{}\n{}", title, self.create_summary_table(report))
    }
}
