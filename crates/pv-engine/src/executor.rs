//! Remote statement execution
//!
//! Runs one statement through the execute-SQL procedure with bounded
//! retries, treats "already exists" class errors as success, and falls back
//! to the table data API for plain CRUD statements that carry a structured
//! request. Remote failures never escape as errors; every attempt ends in an
//! [`ExecutionReport`].

use crate::settings::EngineSettings;
use pv_core::{CapabilityState, ExecutionOutcome, ExecutionPath, Statement};
use pv_db::{DbError, RemoteDatabase};
use pv_sql::SqlParser;

/// What happened to one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,

    /// Path that produced the outcome; `None` when nothing could be tried
    pub path: ExecutionPath,

    /// Calls made through the procedure
    pub attempts: u32,

    /// Whether the data API was tried
    pub fallback_attempted: bool,
}

impl ExecutionReport {
    fn new(outcome: ExecutionOutcome, path: ExecutionPath, attempts: u32) -> Self {
        Self {
            outcome,
            path,
            attempts,
            fallback_attempted: false,
        }
    }
}

/// Error classes the executor knows how to handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    /// Target already present; counts as success
    AlreadyExists,
    /// The procedure itself is missing; retrying cannot help
    ProcedureMissing,
    /// Transport problem; worth retrying
    Transient,
    /// Known remote rejection (missing table, bad response)
    Remote,
    /// Nothing above; logged for later classification
    Unclassified,
}

/// Result of the procedure path
enum PrimaryResult {
    Done(ExecutionOutcome),
    Failed(DbError),
}

/// Statement executor bound to one connection
pub struct Executor<'a> {
    db: &'a dyn RemoteDatabase,
    settings: &'a EngineSettings,
    parser: SqlParser,
}

impl<'a> Executor<'a> {
    pub fn new(db: &'a dyn RemoteDatabase, settings: &'a EngineSettings) -> Self {
        Self {
            db,
            settings,
            parser: SqlParser::postgres(),
        }
    }

    fn classify(&self, err: &DbError) -> FailureClass {
        if self.settings.is_already_exists(err) {
            return FailureClass::AlreadyExists;
        }
        match err {
            DbError::ProcedureNotFound { .. } => FailureClass::ProcedureMissing,
            e if e.is_transient() => FailureClass::Transient,
            DbError::TableNotFound(_) | DbError::InvalidResponse(_) => FailureClass::Remote,
            DbError::Remote { code: Some(_), .. } => FailureClass::Remote,
            _ => FailureClass::Unclassified,
        }
    }

    /// Execute one statement.
    ///
    /// Never fails: the outcome, path and attempt count are reported.
    pub async fn execute(
        &self,
        statement: &Statement,
        capability: &CapabilityState,
    ) -> ExecutionReport {
        let mut last_error: Option<DbError> = None;
        let mut attempts = 0;

        if capability.can_execute() {
            let (result, made) = self.execute_via_procedure(statement).await;
            attempts = made;
            match result {
                PrimaryResult::Done(outcome) => {
                    return ExecutionReport::new(outcome, ExecutionPath::Procedure, attempts);
                }
                PrimaryResult::Failed(err) => last_error = Some(err),
            }
        } else {
            log::debug!(
                "Skipping procedure for '{}': capability {}",
                statement.label,
                capability
            );
        }

        if let Some(mut report) = self.execute_via_data_api(statement).await {
            report.attempts = attempts;
            return report;
        }

        let message = match last_error {
            Some(err) => {
                if self.classify(&err) == FailureClass::Unclassified {
                    log::warn!(
                        "Unclassified failure for '{}': {} (add an idempotency marker if this is harmless)",
                        statement.label,
                        err
                    );
                }
                err.to_string()
            }
            None => format!(
                "execution procedure unavailable ({}) and no data-API fallback applies",
                capability
            ),
        };
        let path = if attempts > 0 {
            ExecutionPath::Procedure
        } else {
            ExecutionPath::None
        };
        ExecutionReport::new(ExecutionOutcome::Failed { message }, path, attempts)
    }

    /// Call the procedure up to `max_attempts` times with exponential backoff
    async fn execute_via_procedure(&self, statement: &Statement) -> (PrimaryResult, u32) {
        let payload = self.settings.procedure_payload(&statement.sql);
        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let result = self
                .db
                .call_procedure(&self.settings.procedure_name, &payload)
                .await;
            attempt += 1;

            let err = match result {
                Ok(_) => return (PrimaryResult::Done(ExecutionOutcome::Success), attempt),
                Err(err) => err,
            };

            match self.classify(&err) {
                FailureClass::AlreadyExists => {
                    log::debug!("'{}' already exists: {}", statement.label, err);
                    return (
                        PrimaryResult::Done(ExecutionOutcome::SkippedAlreadyExists),
                        attempt,
                    );
                }
                FailureClass::ProcedureMissing => {
                    log::debug!(
                        "Procedure {} missing while running '{}'",
                        self.settings.procedure_name,
                        statement.label
                    );
                    return (PrimaryResult::Failed(err), attempt);
                }
                _ => {}
            }

            if attempt >= max_attempts {
                log::debug!(
                    "'{}' failed after {} attempt(s): {}",
                    statement.label,
                    attempt,
                    err
                );
                return (PrimaryResult::Failed(err), attempt);
            }

            let delay = self.settings.retry.backoff(attempt - 1);
            log::debug!(
                "'{}' attempt {}/{} failed: {}; retrying in {:?}",
                statement.label,
                attempt,
                max_attempts,
                err,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Issue the statement's structured request once, when it is eligible.
    ///
    /// Eligible means the SQL parses as a single plain SELECT, INSERT, UPDATE
    /// or DELETE and the statement carries a data request.
    async fn execute_via_data_api(&self, statement: &Statement) -> Option<ExecutionReport> {
        let request = statement.data_request.as_ref()?;
        let class = self.parser.classify(&statement.sql);
        if !class.is_data_access() {
            log::debug!(
                "No fallback for '{}': statement is {}",
                statement.label,
                class
            );
            return None;
        }

        log::debug!(
            "Falling back to data API for '{}' ({} {})",
            statement.label,
            request.verb(),
            request.table()
        );
        let outcome = match self.db.run(request).await {
            Ok(_) => ExecutionOutcome::Success,
            Err(err) if self.classify(&err) == FailureClass::AlreadyExists => {
                ExecutionOutcome::SkippedAlreadyExists
            }
            Err(err) => {
                if self.classify(&err) == FailureClass::Unclassified {
                    log::warn!(
                        "Unclassified data-API failure for '{}': {}",
                        statement.label,
                        err
                    );
                }
                ExecutionOutcome::Failed {
                    message: err.to_string(),
                }
            }
        };
        let mut report = ExecutionReport::new(outcome, ExecutionPath::DataApi, 0);
        report.fallback_attempted = true;
        Some(report)
    }
}

/// Execute one statement against `db`.
///
/// Convenience wrapper around [`Executor`] for single calls.
pub async fn execute(
    db: &dyn RemoteDatabase,
    statement: &Statement,
    capability: &CapabilityState,
    settings: &EngineSettings,
) -> ExecutionReport {
    Executor::new(db, settings)
        .execute(statement, capability)
        .await
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
