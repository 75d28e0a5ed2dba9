//! Dialects the parser understands

use sqlparser::ast::Statement;
use sqlparser::dialect::{GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use std::fmt;
use std::str::FromStr;

use crate::error::{SqlError, SqlResult};

/// SQL dialect used for parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// Everything sent to the remote database
    #[default]
    Postgres,
    /// Permissive ANSI parsing
    Generic,
}

impl SqlDialect {
    pub fn name(self) -> &'static str {
        match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::Generic => "generic",
        }
    }

    /// Parse `sql` into statements
    pub fn parse(self, sql: &str) -> SqlResult<Vec<Statement>> {
        let result = match self {
            SqlDialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
            SqlDialect::Generic => Parser::parse_sql(&GenericDialect {}, sql),
        };
        result.map_err(|e| SqlError::from_parser_message(e.to_string()))
    }
}

impl FromStr for SqlDialect {
    type Err = SqlError;

    fn from_str(name: &str) -> SqlResult<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "generic" | "ansi" => Ok(SqlDialect::Generic),
            _ => Err(SqlError::UnknownDialect(name.to_string())),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
