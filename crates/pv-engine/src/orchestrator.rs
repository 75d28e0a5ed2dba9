//! Migration orchestration
//!
//! Drives one run through `Idle -> Bootstrapping -> ExecutingGroup(i) ->
//! Verifying -> Done`. Statements run strictly one at a time in catalog
//! order; a failed statement is recorded and the run continues.

use crate::bootstrap::ensure_exec_capability;
use crate::error::EngineResult;
use crate::executor::Executor;
use crate::reporter::Reporter;
use crate::settings::EngineSettings;
use pv_catalog::{build_schema, SchemaDefinition};
use pv_core::{
    CapabilityState, ExecutionOutcome, InstallationStatus, RunState, RunSummary, SchemaDescription,
};
use pv_db::{DataApi, DbError, RemoteDatabase};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Bootstrapping,
    /// Executing the group at this index
    ExecutingGroup { index: usize },
    Verifying,
    /// Finished; `success` is false when any statement failed
    Done { success: bool },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Bootstrapping => write!(f, "bootstrapping"),
            Phase::ExecutingGroup { index } => write!(f, "executing group {}", index),
            Phase::Verifying => write!(f, "verifying"),
            Phase::Done { success: true } => write!(f, "done (success)"),
            Phase::Done { success: false } => write!(f, "done (partial)"),
        }
    }
}

/// Outcome of the post-run verification read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// The verification table answered with `rows` rows (at most 1)
    Verified { rows: usize },
    /// The read failed; never affects the error count
    Unverified { reason: String },
}

/// Final user-facing classification of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Success,
    CompletedWithWarnings,
}

/// Result of one migration run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,

    /// True iff no statement failed
    pub success: bool,

    /// `label: message` for every failed statement, in order
    pub errors: Vec<String>,

    pub summary: RunSummary,

    pub capability: CapabilityState,

    pub verification: Verification,

    pub installation: InstallationStatus,

    /// Always `Done`
    pub phase: Phase,

    /// Stopped early by the abort flag
    pub aborted: bool,
}

impl RunResult {
    pub fn completion(&self) -> Completion {
        if self.success && !self.aborted {
            Completion::Success
        } else {
            Completion::CompletedWithWarnings
        }
    }

    /// Final status line
    pub fn banner(&self) -> String {
        match self.completion() {
            Completion::Success => format!(
                "Database setup complete: {} statement(s) applied",
                self.summary.completed
            ),
            Completion::CompletedWithWarnings if self.aborted => format!(
                "Database setup aborted after {} of {} statement(s)",
                self.summary.completed, self.summary.total
            ),
            Completion::CompletedWithWarnings => format!(
                "Database setup completed with {} warning(s)",
                self.errors.len()
            ),
        }
    }
}

/// Drives migration runs against one connection
pub struct Orchestrator<'a> {
    db: &'a dyn RemoteDatabase,
    settings: &'a EngineSettings,
    abort: Option<Arc<AtomicBool>>,
    phase: Phase,
}

impl<'a> Orchestrator<'a> {
    pub fn new(db: &'a dyn RemoteDatabase, settings: &'a EngineSettings) -> Self {
        Self {
            db,
            settings,
            abort: None,
            phase: Phase::Idle,
        }
    }

    /// Stop between statements once `flag` is set
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = Some(flag);
        self
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        log::debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
    }

    fn abort_requested(&self) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Apply every statement of `schema` and verify the result.
    ///
    /// Statement failures are collected, reported, and never abort the run.
    /// Only invalid settings produce an `Err`.
    pub async fn run(
        &mut self,
        schema: &SchemaDescription,
        reporter: &mut dyn Reporter,
    ) -> EngineResult<RunResult> {
        self.settings.validate()?;

        let mut state = RunState::new(schema.total_statements());
        log::debug!(
            "run {}: {} statement(s) in {} group(s) via {}",
            state.run_id,
            state.total_statements(),
            schema.groups().len(),
            self.db.backend_name()
        );

        self.transition(Phase::Bootstrapping);
        let capability = ensure_exec_capability(self.db, self.settings).await;

        let executor = Executor::new(self.db, self.settings);
        let mut aborted = false;

        'groups: for (index, group) in schema.groups().iter().enumerate() {
            self.transition(Phase::ExecutingGroup { index });
            log::debug!(
                "run {}: group {} ({} statement(s))",
                state.run_id,
                group.kind,
                group.len()
            );

            for statement in &group.statements {
                if self.abort_requested() {
                    log::warn!(
                        "run {}: abort requested, skipping remaining statements",
                        state.run_id
                    );
                    aborted = true;
                    break 'groups;
                }

                state.begin(&statement.label);
                let report = executor.execute(statement, &capability).await;
                state.record(&report.outcome, report.path);

                match &report.outcome {
                    ExecutionOutcome::Failed { message } => {
                        reporter.on_error(&format!("{}: {}", statement.label, message));
                    }
                    _ => reporter.on_success(&statement.label),
                }
                reporter.on_progress(state.progress_percent(), &statement.label);
            }
        }

        self.transition(Phase::Verifying);
        let (verification, installation) =
            verify_installation(self.db, &self.settings.verification_table).await;

        let summary = state.summary();
        let run_id = state.run_id.clone();
        let errors = state.into_errors();
        let success = errors.is_empty();
        self.transition(Phase::Done { success });

        log::debug!(
            "run {}: {} succeeded, {} skipped, {} failed, {} via fallback",
            run_id,
            summary.succeeded,
            summary.skipped_existing,
            summary.failed,
            summary.via_fallback
        );

        Ok(RunResult {
            run_id,
            success,
            errors,
            summary,
            capability,
            verification,
            installation,
            phase: self.phase,
            aborted,
        })
    }
}

/// One-row read against the verification table.
///
/// A missing table means not installed; any other failure leaves the
/// status unknown.
pub async fn verify_installation<D>(db: &D, table: &str) -> (Verification, InstallationStatus)
where
    D: DataApi + ?Sized,
{
    match db.select(table, 1).await {
        Ok(rows) => (
            Verification::Verified { rows: rows.len() },
            InstallationStatus::Installed {
                verified_rows: rows.len(),
            },
        ),
        Err(err) => {
            log::warn!("Verification read on {} failed: {}", table, err);
            let installation = match &err {
                DbError::TableNotFound(_) => InstallationStatus::NotInstalled,
                other => InstallationStatus::Unknown {
                    reason: other.to_string(),
                },
            };
            (
                Verification::Unverified {
                    reason: err.to_string(),
                },
                installation,
            )
        }
    }
}

/// Build the built-in catalog and run it.
///
/// Catalog construction faults propagate as `Err`; remote failures end up
/// in the returned result.
pub async fn run_migration(
    db: &dyn RemoteDatabase,
    reporter: &mut dyn Reporter,
    settings: &EngineSettings,
) -> EngineResult<RunResult> {
    let definition = SchemaDefinition::storefront()?;
    run_migration_with(db, reporter, settings, &definition).await
}

/// Build the catalog from `definition` and run it
pub async fn run_migration_with(
    db: &dyn RemoteDatabase,
    reporter: &mut dyn Reporter,
    settings: &EngineSettings,
    definition: &SchemaDefinition,
) -> EngineResult<RunResult> {
    let schema = build_schema(definition, &settings.catalog_params())?;
    Orchestrator::new(db, settings).run(&schema, reporter).await
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
