// src/main.rs

use clap::Parser;
use copytree::cli::Cli;
use copytree::errors::Error;
use copytree::CancellationToken;
#[cfg(feature = "progress")]
use copytree::progress::{IndicatifProgress, ProgressReporter};
use std::process::ExitCode;
#[cfg(feature = "progress")]
use std::sync::Arc;

const EXIT_USAGE: u8 = 1;
const EXIT_VALIDATION: u8 = 2;
const EXIT_RUNTIME: u8 = 3;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version are successful exits; everything else is a
            // usage error.
            if e.use_stderr() {
                let _ = e.print();
                return ExitCode::from(EXIT_USAGE);
            }
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    log::info!("Starting copytree v{}", env!("CARGO_PKG_VERSION"));

    let (base, mut options) = match cli.into_options() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_VALIDATION);
        }
    };

    // Ctrl+C trips the shared token; every stage observes it.
    let token = CancellationToken::new();
    options.signal = Some(token.clone());
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        log::warn!("Could not install the Ctrl+C handler: {e}");
    }

    #[cfg(feature = "progress")]
    {
        // Only show the bar when stdout is not carrying the document.
        let stdout_in_use =
            options.display || (options.output.is_none() && !options.clipboard);
        if atty::is(atty::Stream::Stderr) && !stdout_in_use {
            let reporter: Arc<dyn ProgressReporter> = Arc::new(IndicatifProgress::new());
            let bar = Arc::clone(&reporter);
            options.on_progress = Some(Box::new(move |event| bar.report(event)));
        }
    }

    match copytree::copy(&base, options) {
        Ok(result) => {
            if result.stats.dry_run {
                for entry in &result.manifest {
                    println!("{} ({} B)", entry.path, entry.size);
                }
                eprintln!(
                    "copytree: dry run, {} file(s), {} bytes",
                    result.stats.total_files, result.stats.total_size
                );
            }
            if !result.stats.scan_errors.is_empty() {
                eprintln!(
                    "copytree: skipped {} path(s) due to I/O errors",
                    result.stats.scan_errors.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            match &e {
                Error::ScanAborted => eprintln!("Operation cancelled."),
                other => eprintln!("Error: {other}"),
            }
            match e {
                Error::Validation(_) | Error::ProfileNotFound(_) | Error::Pattern { .. } => {
                    ExitCode::from(EXIT_VALIDATION)
                }
                _ => ExitCode::from(EXIT_RUNTIME),
            }
        }
    }
}
