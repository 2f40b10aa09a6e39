//! Side-effect sinks for `copy`: stdout, output file, and clipboard.

use crate::errors::{io_error_with_path, Result};
use crate::options::Options;
use log::{debug, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// What `deliver` actually did with the rendered output.
#[derive(Debug, Default)]
pub struct DeliveryOutcome {
    /// Path the output was written to, when `--output` was set.
    pub output_path: Option<PathBuf>,
    /// Clipboard failure message, when the copy was requested but failed.
    /// Non-fatal: the run still succeeds and the error lands in the stats.
    pub clipboard_error: Option<String>,
}

/// Routes the rendered document to the requested sinks.
pub fn deliver(output: &str, options: &Options) -> Result<DeliveryOutcome> {
    let mut outcome = DeliveryOutcome::default();

    if let Some(path) = &options.output {
        let file = File::create(path).map_err(|e| io_error_with_path(e, path))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(output.as_bytes())
            .map_err(|e| io_error_with_path(e, path))?;
        writer.flush().map_err(|e| io_error_with_path(e, path))?;
        info!("Wrote output to {}", path.display());
        outcome.output_path = Some(path.clone());
    }

    if options.clipboard {
        match copy_to_clipboard(output) {
            Ok(()) => debug!("Output copied to clipboard"),
            Err(e) => {
                log::warn!("Clipboard copy failed: {e}");
                outcome.clipboard_error = Some(e);
            }
        }
    }

    if options.display || (options.output.is_none() && !options.clipboard) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.as_bytes())
            .map_err(|e| io_error_with_path(e, "stdout"))?;
        handle.flush().map_err(|e| io_error_with_path(e, "stdout"))?;
    }

    Ok(outcome)
}

#[cfg(feature = "clipboard")]
fn copy_to_clipboard(content: &str) -> std::result::Result<(), String> {
    use arboard::Clipboard;
    let mut clipboard = Clipboard::new().map_err(|e| e.to_string())?;
    clipboard.set_text(content).map_err(|e| e.to_string())
}

#[cfg(not(feature = "clipboard"))]
fn copy_to_clipboard(_content: &str) -> std::result::Result<(), String> {
    Err("clipboard support not compiled in".to_string())
}
