//! Test doubles for the migration engine
//!
//! [`ScriptedDatabase`] is a stateful in-memory stand-in for the remote
//! database. It records every call in order, answers "already exists" when
//! the same definition statement is executed twice (inserts that ignore
//! conflicts keep succeeding), and can be scripted to
//! hide the execute-SQL procedure or fail particular statements.
//! [`RecordingReporter`] keeps every event it receives.

use crate::bootstrap::PROBE_SQL;
use crate::reporter::{Reporter, ReporterEvent};
use async_trait::async_trait;
use pv_core::sql_utils::normalize_relation;
use pv_core::{Filter, OnConflict, Row};
use pv_db::{DataApi, DbError, DbResult, RemoteDatabase, RemoteProcedure};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One call received by [`ScriptedDatabase`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Procedure { name: String, sql: Option<String> },
    Select { table: String, limit: usize },
    Insert { table: String, rows: usize },
    Update { table: String },
    Delete { table: String },
}

/// Scripted failure for statements whose SQL contains `pattern`
#[derive(Debug, Clone)]
struct Failure {
    pattern: String,
    code: Option<String>,
    message: String,
    /// Remaining failures; `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
struct ScriptState {
    procedure_present: bool,
    installable: bool,
    calls: Vec<Call>,
    executed: HashSet<String>,
    tables: HashMap<String, Vec<Row>>,
    failures: Vec<Failure>,
    data_api_failure: Option<String>,
    connection_down: bool,
}

/// In-memory remote database for tests
#[derive(Debug)]
pub struct ScriptedDatabase {
    procedure_name: String,
    sql_param: String,
    state: Mutex<ScriptState>,
}

impl Default for ScriptedDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDatabase {
    /// Database with the `exec_sql` procedure already installed
    pub fn new() -> Self {
        Self {
            procedure_name: "exec_sql".to_string(),
            sql_param: "sql".to_string(),
            state: Mutex::new(ScriptState {
                procedure_present: true,
                ..Default::default()
            }),
        }
    }

    /// Database without the procedure.
    ///
    /// When `installable`, submitting the procedure's `CREATE FUNCTION`
    /// through the call installs it.
    pub fn without_procedure(installable: bool) -> Self {
        let db = Self::new();
        {
            let mut state = db.state();
            state.procedure_present = false;
            state.installable = installable;
        }
        db
    }

    /// Fail every statement containing `pattern` with `message`
    pub fn fail_always(self, pattern: &str, message: &str) -> Self {
        self.push_failure(pattern, None, message, None)
    }

    /// Fail the first `times` executions of statements containing `pattern`
    pub fn fail_times(self, pattern: &str, message: &str, times: usize) -> Self {
        self.push_failure(pattern, None, message, Some(times))
    }

    /// Fail statements containing `pattern` with a SQLSTATE-coded error
    pub fn fail_with_code(self, pattern: &str, code: &str, message: &str) -> Self {
        self.push_failure(pattern, Some(code.to_string()), message, None)
    }

    /// Make every data-API call fail with `message`
    pub fn fail_data_api(self, message: &str) -> Self {
        self.state().data_api_failure = Some(message.to_string());
        self
    }

    /// Make every call fail at the transport level
    pub fn disconnected(self) -> Self {
        self.state().connection_down = true;
        self
    }

    /// Declare an existing table with rows
    pub fn with_table(self, table: &str, rows: Vec<Row>) -> Self {
        self.state().tables.insert(table.to_string(), rows);
        self
    }

    fn push_failure(
        self,
        pattern: &str,
        code: Option<String>,
        message: &str,
        remaining: Option<usize>,
    ) -> Self {
        self.state().failures.push(Failure {
            pattern: pattern.to_string(),
            code,
            message: message.to_string(),
            remaining,
        });
        self
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// SQL sent through the procedure, in order, excluding capability probes
    pub fn executed_sql(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Procedure { sql: Some(sql), .. } if sql != PROBE_SQL => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of procedure calls whose SQL contains `pattern`
    pub fn attempts_for(&self, pattern: &str) -> usize {
        self.executed_sql()
            .iter()
            .filter(|sql| sql.contains(pattern))
            .count()
    }

    /// Whether the execute-SQL procedure currently exists
    pub fn procedure_present(&self) -> bool {
        self.state().procedure_present
    }

    /// Rows stored through the data API for `table`
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Forget the call log, keeping database contents
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

/// Table created by a `CREATE TABLE IF NOT EXISTS` statement
fn created_table(sql: &str) -> Option<String> {
    let rest = sql.trim_start().strip_prefix("CREATE TABLE IF NOT EXISTS ")?;
    let name: String = rest
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '(')
        .collect();
    Some(normalize_relation(&name))
}

/// `INSERT ... ON CONFLICT ... DO NOTHING` succeeds however often it runs
fn ignores_conflicts(sql: &str) -> bool {
    let upper = sql.to_uppercase();
    upper.trim_start().starts_with("INSERT")
        && upper.contains("ON CONFLICT")
        && upper.contains("DO NOTHING")
}

fn already_exists_error(sql: &str) -> DbError {
    if sql.trim_start().starts_with("INSERT") {
        DbError::Remote {
            code: Some("23505".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        }
    } else {
        DbError::Remote {
            code: Some("42710".to_string()),
            message: "object already exists".to_string(),
        }
    }
}

impl ScriptState {
    fn scripted_failure(&mut self, sql: &str) -> Option<DbError> {
        let failure = self.failures.iter_mut().find(|f| {
            sql.contains(f.pattern.as_str()) && f.remaining.map(|n| n > 0).unwrap_or(true)
        })?;
        if let Some(n) = failure.remaining.as_mut() {
            *n -= 1;
        }
        Some(DbError::Remote {
            code: failure.code.clone(),
            message: failure.message.clone(),
        })
    }

    fn data_api_check(&self, table: &str) -> DbResult<()> {
        if self.connection_down {
            return Err(DbError::ConnectionError("connection refused".to_string()));
        }
        if let Some(message) = &self.data_api_failure {
            return Err(DbError::Remote {
                code: None,
                message: message.clone(),
            });
        }
        if !self.tables.contains_key(table) {
            return Err(DbError::TableNotFound(table.to_string()));
        }
        Ok(())
    }
}

fn matches_filters(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| row.get(&f.column).unwrap_or(&Value::Null) == &f.value)
}

#[async_trait]
impl RemoteProcedure for ScriptedDatabase {
    async fn call_procedure(&self, name: &str, args: &Value) -> DbResult<Value> {
        let sql = args
            .get(&self.sql_param)
            .and_then(Value::as_str)
            .map(String::from);
        let mut state = self.state();
        state.calls.push(Call::Procedure {
            name: name.to_string(),
            sql: sql.clone(),
        });

        if state.connection_down {
            return Err(DbError::ConnectionError("connection refused".to_string()));
        }

        let Some(sql) = sql else {
            return Err(DbError::Remote {
                code: Some("42883".to_string()),
                message: format!("missing argument {}", self.sql_param),
            });
        };

        if name != self.procedure_name || !state.procedure_present {
            let installs_itself = sql.contains("CREATE OR REPLACE FUNCTION")
                && sql.contains(&format!("\"{}\"(", self.procedure_name));
            if name == self.procedure_name && state.installable && installs_itself {
                state.procedure_present = true;
                return Ok(Value::Null);
            }
            return Err(DbError::ProcedureNotFound {
                name: name.to_string(),
            });
        }

        if let Some(err) = state.scripted_failure(&sql) {
            return Err(err);
        }

        if sql == PROBE_SQL {
            return Ok(Value::Null);
        }

        if !state.executed.insert(sql.clone()) && !ignores_conflicts(&sql) {
            return Err(already_exists_error(&sql));
        }
        if let Some(table) = created_table(&sql) {
            state.tables.entry(table).or_default();
        }
        Ok(Value::Null)
    }
}

#[async_trait]
impl DataApi for ScriptedDatabase {
    async fn select(&self, table: &str, limit: usize) -> DbResult<Vec<Row>> {
        let mut state = self.state();
        state.calls.push(Call::Select {
            table: table.to_string(),
            limit,
        });
        state.data_api_check(table)?;
        Ok(state
            .tables
            .get(table)
            .map(|rows| rows.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        table: &str,
        rows: &[Row],
        on_conflict: OnConflict,
        conflict_columns: &[String],
    ) -> DbResult<usize> {
        let mut state = self.state();
        state.calls.push(Call::Insert {
            table: table.to_string(),
            rows: rows.len(),
        });
        // Tables spring into existence on first insert
        if state.data_api_failure.is_none() && !state.connection_down {
            state.tables.entry(table.to_string()).or_default();
        }
        state.data_api_check(table)?;

        let stored = state.tables.entry(table.to_string()).or_default();
        let mut inserted = 0;
        for row in rows {
            let duplicate = !conflict_columns.is_empty()
                && stored.iter().any(|existing| {
                    conflict_columns
                        .iter()
                        .all(|c| existing.get(c) == row.get(c))
                });
            if duplicate {
                match on_conflict {
                    OnConflict::Ignore => continue,
                    OnConflict::Error => {
                        return Err(already_exists_error("INSERT"));
                    }
                }
            }
            stored.push(row.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn update(&self, table: &str, values: &Row, filters: &[Filter]) -> DbResult<usize> {
        let mut state = self.state();
        state.calls.push(Call::Update {
            table: table.to_string(),
        });
        state.data_api_check(table)?;
        let mut changed = 0;
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches_filters(r, filters)) {
                for (k, v) in values {
                    row.insert(k.clone(), v.clone());
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> DbResult<usize> {
        let mut state = self.state();
        state.calls.push(Call::Delete {
            table: table.to_string(),
        });
        state.data_api_check(table)?;
        let mut removed = 0;
        if let Some(rows) = state.tables.get_mut(table) {
            let before = rows.len();
            rows.retain(|r| !matches_filters(r, filters));
            removed = before - rows.len();
        }
        Ok(removed)
    }
}

impl RemoteDatabase for ScriptedDatabase {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }
}

/// Reporter that keeps every event in order
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    pub events: Vec<ReporterEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentages of all progress events, in order
    pub fn progress(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Messages of all success events
    pub fn successes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::Success { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Messages of all error events
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::Error { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn on_progress(&mut self, percent: u8, label: &str) {
        self.events.push(ReporterEvent::Progress {
            percent,
            label: label.to_string(),
        });
    }

    fn on_success(&mut self, message: &str) {
        self.events.push(ReporterEvent::Success {
            message: message.to_string(),
        });
    }

    fn on_error(&mut self, message: &str) {
        self.events.push(ReporterEvent::Error {
            message: message.to_string(),
        });
    }
}
