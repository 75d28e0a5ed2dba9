//! SQL parser wrapper

use crate::dialect::SqlDialect;
use crate::error::{SqlError, SqlResult};
use sqlparser::ast::Statement;

/// Parser bound to one dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParser {
    dialect: SqlDialect,
}

impl SqlParser {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Parser for the remote database's dialect
    pub fn postgres() -> Self {
        Self::new(SqlDialect::Postgres)
    }

    /// Parse SQL into AST statements; blank input is an error
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlError::EmptySql);
        }
        self.dialect.parse(sql)
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
