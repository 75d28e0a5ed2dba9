//! Per-run progress tracking
//!
//! A [`RunState`] is owned by exactly one migration run. It is created with the
//! statement total fixed, advanced once per attempted statement, and dropped
//! when the run returns. It is never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::statement::{ExecutionOutcome, ExecutionPath};

/// Mutable state of one migration run
#[derive(Debug, Clone)]
pub struct RunState {
    /// Short identifier used in log lines
    pub run_id: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    total_statements: usize,
    completed_count: usize,
    errors: Vec<String>,
    current_task_label: String,

    succeeded: usize,
    skipped_existing: usize,
    via_fallback: usize,
}

/// Aggregate counters for a finished (or in-flight) run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    pub via_fallback: usize,
    pub duration_ms: u64,
}

impl RunState {
    /// Create a run state for `total_statements` statements
    pub fn new(total_statements: usize) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string()[..8].to_string(),
            started_at: Utc::now(),
            total_statements,
            completed_count: 0,
            errors: Vec::new(),
            current_task_label: String::new(),
            succeeded: 0,
            skipped_existing: 0,
            via_fallback: 0,
        }
    }

    /// Set the label of the statement about to run
    pub fn begin(&mut self, label: &str) {
        self.current_task_label = label.to_string();
    }

    /// Record the outcome of the current statement.
    ///
    /// `completed_count` is clamped at the total; recording more outcomes than
    /// statements is a caller bug and is logged.
    pub fn record(&mut self, outcome: &ExecutionOutcome, path: ExecutionPath) {
        if self.completed_count >= self.total_statements {
            log::warn!(
                "run {}: outcome recorded past the statement total ({})",
                self.run_id,
                self.total_statements
            );
        } else {
            self.completed_count += 1;
        }

        match outcome {
            ExecutionOutcome::Success => self.succeeded += 1,
            ExecutionOutcome::SkippedAlreadyExists => self.skipped_existing += 1,
            ExecutionOutcome::Failed { message } => {
                self.errors
                    .push(format!("{}: {}", self.current_task_label, message));
            }
        }

        if outcome.is_ok() && path == ExecutionPath::DataApi {
            self.via_fallback += 1;
        }
    }

    pub fn total_statements(&self) -> usize {
        self.total_statements
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn current_task_label(&self) -> &str {
        &self.current_task_label
    }

    /// Progress as a whole percentage; 100 only once every statement is done
    pub fn progress_percent(&self) -> u8 {
        if self.total_statements == 0 {
            return 100;
        }
        ((self.completed_count * 100) / self.total_statements) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count == self.total_statements
    }

    /// Consume the state, returning the error list
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    /// Snapshot of the counters
    pub fn summary(&self) -> RunSummary {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        RunSummary {
            total: self.total_statements,
            completed: self.completed_count,
            succeeded: self.succeeded,
            skipped_existing: self.skipped_existing,
            failed: self.errors.len(),
            via_fallback: self.via_fallback,
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
        }
    }
}

#[cfg(test)]
#[path = "run_state_test.rs"]
mod tests;
