/*!
 * Command-line interface for mirrorsync
 */

use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use rayon::ThreadPoolBuilder;
use tracing::{error, warn};

use mirrorsync::config::{Args, Config};
use mirrorsync::logging::init_logging;
use mirrorsync::report::{ReportFormat, Reporter};
use mirrorsync::verify::verify_tree;
use mirrorsync::walker::Synchronizer;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(shell) = args.generate {
        generate(shell, &mut Args::command(), "mirrorsync", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = Config::from_args(args);

    let level = if config.quiet { "warn" } else { "info" };
    if let Err(e) = init_logging(level) {
        eprintln!("Warning: {}", e);
    }

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sync, optionally verify, and report. Returns false when verification failed.
fn run(config: Config) -> mirrorsync::Result<bool> {
    config.validate()?;

    // Size the pool used by the verification pass
    if let Err(e) = ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build_global()
    {
        warn!("Failed to set thread pool size: {}", e);
    }

    let report = Synchronizer::new(config.clone()).run()?;
    if !config.quiet {
        Reporter::new(ReportFormat::ConsoleTable).print_report(&report);
    }

    if !config.verify {
        return Ok(true);
    }

    let verification = verify_tree(&config)?;
    if !config.quiet {
        println!(
            "Verified {} files: {} mismatched, {} unreadable",
            verification.files_checked,
            verification.mismatched.len(),
            verification.failed.len()
        );
    }
    Ok(verification.is_clean())
}
