//! Statement classification
//!
//! Only a single, parseable SELECT/INSERT/UPDATE/DELETE counts as plain data
//! access. Everything else (DDL, procedural `DO` blocks the parser does not
//! understand, multi-statement batches) must go through the remote SQL
//! procedure.

use crate::parser::SqlParser;
use serde::Serialize;
use sqlparser::ast::Statement;
use std::fmt;

/// Coarse class of one SQL text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementClass {
    Select,
    Insert,
    Update,
    Delete,
    /// Parsed, but not data access (CREATE, ALTER, GRANT, ...)
    Definition,
    /// More than one statement in the text
    Batch,
    /// Rejected by the parser
    Unparsed,
}

impl StatementClass {
    /// Whether the table data API can express this statement
    pub fn is_data_access(self) -> bool {
        matches!(
            self,
            StatementClass::Select
                | StatementClass::Insert
                | StatementClass::Update
                | StatementClass::Delete
        )
    }
}

impl fmt::Display for StatementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementClass::Select => "select",
            StatementClass::Insert => "insert",
            StatementClass::Update => "update",
            StatementClass::Delete => "delete",
            StatementClass::Definition => "definition",
            StatementClass::Batch => "batch",
            StatementClass::Unparsed => "unparsed",
        };
        write!(f, "{}", s)
    }
}

/// Classify a parsed statement
fn classify_statement(statement: &Statement) -> StatementClass {
    match statement {
        Statement::Query(_) => StatementClass::Select,
        Statement::Insert { .. } => StatementClass::Insert,
        Statement::Update { .. } => StatementClass::Update,
        Statement::Delete { .. } => StatementClass::Delete,
        _ => StatementClass::Definition,
    }
}

impl SqlParser {
    /// Classify SQL text; parse failures yield [`StatementClass::Unparsed`]
    pub fn classify(&self, sql: &str) -> StatementClass {
        match self.parse(sql) {
            Ok(stmts) => match stmts.as_slice() {
                [single] => classify_statement(single),
                [] => StatementClass::Unparsed,
                _ => StatementClass::Batch,
            },
            Err(_) => StatementClass::Unparsed,
        }
    }
}

#[cfg(test)]
#[path = "classify_test.rs"]
mod tests;
