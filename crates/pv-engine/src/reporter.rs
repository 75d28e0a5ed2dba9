//! Progress and result reporting
//!
//! The orchestrator emits events synchronously, in order, from the task
//! running the migration. For every statement it emits exactly one
//! success-or-error event followed by one progress event.

use serde::Serialize;

/// Receiver of migration events
pub trait Reporter: Send {
    /// Whole-percent progress after a statement finished
    fn on_progress(&mut self, percent: u8, label: &str);

    /// A statement succeeded (or its target already existed)
    fn on_success(&mut self, message: &str);

    /// A statement failed after all attempts; `message` is `label: error`
    fn on_error(&mut self, message: &str);
}

/// One emitted event, for sinks that store or serialize events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReporterEvent {
    Progress { percent: u8, label: String },
    Success { message: String },
    Error { message: String },
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_progress(&mut self, _percent: u8, _label: &str) {}
    fn on_success(&mut self, _message: &str) {}
    fn on_error(&mut self, _message: &str) {}
}

/// Forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_progress(&mut self, percent: u8, label: &str) {
        log::info!("[{:>3}%] {}", percent, label);
    }

    fn on_success(&mut self, message: &str) {
        log::debug!("ok: {}", message);
    }

    fn on_error(&mut self, message: &str) {
        log::warn!("failed: {}", message);
    }
}
