//! Statement model shared by the catalog and the migration engine
//!
//! A [`SchemaDescription`] is an ordered list of [`StatementGroup`]s. Group
//! order is significant: enum types must exist before tables reference them,
//! and tables before indexes, policies, and seed rows. The description is
//! validated once at construction and is read-only afterwards.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row for the data API, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// The class of statements held by a group, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// `CREATE TYPE ... AS ENUM`
    EnumType,
    /// `CREATE TABLE IF NOT EXISTS`
    Table,
    /// `CREATE INDEX IF NOT EXISTS`
    Index,
    /// `ALTER TABLE ... ENABLE ROW LEVEL SECURITY`
    RlsEnable,
    /// `CREATE POLICY` (altered when it already exists)
    RlsPolicy,
    /// Insert-if-absent default rows
    SeedData,
}

impl StatementKind {
    /// All kinds in canonical execution order.
    pub const ALL: [StatementKind; 6] = [
        StatementKind::EnumType,
        StatementKind::Table,
        StatementKind::Index,
        StatementKind::RlsEnable,
        StatementKind::RlsPolicy,
        StatementKind::SeedData,
    ];

    /// Position of this kind in the canonical order (0-based).
    pub fn rank(self) -> usize {
        match self {
            StatementKind::EnumType => 0,
            StatementKind::Table => 1,
            StatementKind::Index => 2,
            StatementKind::RlsEnable => 3,
            StatementKind::RlsPolicy => 4,
            StatementKind::SeedData => 5,
        }
    }

    /// Human-readable group title used in progress output.
    pub fn title(self) -> &'static str {
        match self {
            StatementKind::EnumType => "Enum types",
            StatementKind::Table => "Tables",
            StatementKind::Index => "Indexes",
            StatementKind::RlsEnable => "Row-level security",
            StatementKind::RlsPolicy => "Access policies",
            StatementKind::SeedData => "Seed data",
        }
    }

    /// Whether statements of this kind create a database object.
    ///
    /// Seed rows write data; every other kind defines schema.
    pub fn is_definition(self) -> bool {
        !matches!(self, StatementKind::SeedData)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::EnumType => "enum_type",
            StatementKind::Table => "table",
            StatementKind::Index => "index",
            StatementKind::RlsEnable => "rls_enable",
            StatementKind::RlsPolicy => "rls_policy",
            StatementKind::SeedData => "seed_data",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for StatementKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatementKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| CoreError::ConfigInvalid {
                message: format!("Unknown statement kind '{}'", s),
            })
    }
}

/// Conflict handling for data-API inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnConflict {
    /// Surface the conflict as an error
    #[default]
    Error,
    /// Skip rows that collide with an existing key
    Ignore,
}

/// Equality filter for data-API updates and deletes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Structured form of a plain CRUD statement, issued through the table data
/// API when the generic SQL procedure cannot be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DataRequest {
    Select {
        table: String,
        limit: usize,
    },
    Insert {
        table: String,
        rows: Vec<Row>,
        on_conflict: OnConflict,
        /// Columns forming the conflict target when `on_conflict` is `Ignore`
        #[serde(default)]
        conflict_columns: Vec<String>,
    },
    Update {
        table: String,
        values: Row,
        filters: Vec<Filter>,
    },
    Delete {
        table: String,
        filters: Vec<Filter>,
    },
}

impl DataRequest {
    /// Target table of the request
    pub fn table(&self) -> &str {
        match self {
            DataRequest::Select { table, .. }
            | DataRequest::Insert { table, .. }
            | DataRequest::Update { table, .. }
            | DataRequest::Delete { table, .. } => table,
        }
    }

    /// Short verb used in log output
    pub fn verb(&self) -> &'static str {
        match self {
            DataRequest::Select { .. } => "select",
            DataRequest::Insert { .. } => "insert",
            DataRequest::Update { .. } => "update",
            DataRequest::Delete { .. } => "delete",
        }
    }
}

/// One SQL statement with a display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Human-readable label shown in progress output
    pub label: String,

    /// Rendered SQL text
    pub sql: String,

    /// Data-API equivalent, when the statement is a plain CRUD write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_request: Option<DataRequest>,
}

impl Statement {
    /// Create a statement with no data-API form
    pub fn new(label: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sql: sql.into(),
            data_request: None,
        }
    }

    /// Attach the structured data-API equivalent of this statement
    pub fn with_data_request(mut self, request: DataRequest) -> Self {
        self.data_request = Some(request);
        self
    }
}

/// A batch of same-kind statements, all attempted before the next kind begins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementGroup {
    pub kind: StatementKind,
    pub statements: Vec<Statement>,
}

impl StatementGroup {
    pub fn new(kind: StatementKind, statements: Vec<Statement>) -> Self {
        Self { kind, statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Ordered, validated, immutable list of statement groups
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDescription {
    groups: Vec<StatementGroup>,
}

impl SchemaDescription {
    /// Build a description, checking that group kinds never go backwards in
    /// canonical order and that no statement is blank.
    pub fn new(groups: Vec<StatementGroup>) -> CoreResult<Self> {
        let mut previous: Option<StatementKind> = None;
        for (position, group) in groups.iter().enumerate() {
            if let Some(prev) = previous {
                if group.kind.rank() < prev.rank() {
                    return Err(CoreError::MalformedCatalog {
                        kind: group.kind.to_string(),
                        previous: prev.to_string(),
                        position,
                    });
                }
            }
            for stmt in &group.statements {
                if stmt.label.trim().is_empty() {
                    return Err(CoreError::EmptyStatement {
                        message: format!("statement in group '{}' has an empty label", group.kind),
                    });
                }
                if stmt.sql.trim().is_empty() {
                    return Err(CoreError::EmptyStatement {
                        message: format!("statement '{}' has empty SQL", stmt.label),
                    });
                }
            }
            previous = Some(group.kind);
        }
        Ok(Self { groups })
    }

    /// Groups in execution order
    pub fn groups(&self) -> &[StatementGroup] {
        &self.groups
    }

    /// Number of statements across all groups
    pub fn total_statements(&self) -> usize {
        self.groups.iter().map(StatementGroup::len).sum()
    }

    /// All statements flattened in execution order, paired with their kind
    pub fn statements(&self) -> impl Iterator<Item = (StatementKind, &Statement)> {
        self.groups
            .iter()
            .flat_map(|g| g.statements.iter().map(move |s| (g.kind, s)))
    }

    /// Statements of one kind, across every group of that kind
    pub fn of_kind(&self, kind: StatementKind) -> Vec<&Statement> {
        self.statements()
            .filter(|(k, _)| *k == kind)
            .map(|(_, s)| s)
            .collect()
    }

    /// Number of statements that create schema objects
    pub fn definition_count(&self) -> usize {
        self.statements().filter(|(k, _)| k.is_definition()).count()
    }
}

/// How a statement attempt reached its outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Through the generic execute-SQL procedure
    Procedure,
    /// Through the table data API (narrow fallback)
    DataApi,
    /// Neither path could be used
    None,
}

/// Result of attempting one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The statement ran
    Success,
    /// The target already existed; counted as success
    SkippedAlreadyExists,
    /// Every attempt failed
    Failed { message: String },
}

impl ExecutionOutcome {
    /// Success or an idempotent no-op
    pub fn is_ok(&self) -> bool {
        !matches!(self, ExecutionOutcome::Failed { .. })
    }

    /// Failure message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Failed { message } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Success => write!(f, "success"),
            ExecutionOutcome::SkippedAlreadyExists => write!(f, "skipped (already exists)"),
            ExecutionOutcome::Failed { message } => write!(f, "failed: {}", message),
        }
    }
}

#[cfg(test)]
#[path = "statement_test.rs"]
mod tests;
