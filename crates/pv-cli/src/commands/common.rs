//! Shared helpers for CLI commands

use indicatif::{ProgressBar, ProgressStyle};
use pv_engine::{Reporter, ReporterEvent};
use std::fmt;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and the progress bar is cleared.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; main prints nothing for it
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Exit code for a run that finished with failed statements
pub(crate) const EXIT_WARNINGS: i32 = 4;

/// Reporter used by the CLI, chosen by `--output`
pub(crate) enum CliReporter {
    /// Progress bar on stderr; failures printed above it
    Progress(ProgressBar),
    /// One JSON event per line on stdout
    JsonLines,
}

impl CliReporter {
    pub fn progress(total: usize) -> Self {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        CliReporter::Progress(pb)
    }

    /// Remove the progress bar before printing the summary
    pub fn finish(&self) {
        if let CliReporter::Progress(pb) = self {
            pb.finish_and_clear();
        }
    }

    fn emit(event: &ReporterEvent) {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(err) => log::warn!("Failed to serialize event: {}", err),
        }
    }
}

impl Reporter for CliReporter {
    fn on_progress(&mut self, percent: u8, label: &str) {
        match self {
            CliReporter::Progress(pb) => {
                pb.inc(1);
                pb.set_message(label.to_string());
            }
            CliReporter::JsonLines => Self::emit(&ReporterEvent::Progress {
                percent,
                label: label.to_string(),
            }),
        }
    }

    fn on_success(&mut self, message: &str) {
        match self {
            CliReporter::Progress(_) => log::debug!("ok: {}", message),
            CliReporter::JsonLines => Self::emit(&ReporterEvent::Success {
                message: message.to_string(),
            }),
        }
    }

    fn on_error(&mut self, message: &str) {
        match self {
            CliReporter::Progress(pb) => pb.println(format!("  \u{2717} {}", message)),
            CliReporter::JsonLines => Self::emit(&ReporterEvent::Error {
                message: message.to_string(),
            }),
        }
    }
}

/// Print a serializable value as one line of JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
