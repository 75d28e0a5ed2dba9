//! Error types for pv-sql

use thiserror::Error;

/// SQL parsing errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// S001: SQL rejected by the parser
    #[error("[S001] SQL parse error at line {line}, column {column}: {message}")]
    ParseError {
        message: String,
        line: usize,
        column: usize,
    },

    /// S002: Empty SQL
    #[error("[S002] SQL is empty")]
    EmptySql,

    /// S003: Unknown dialect name
    #[error("[S003] Unknown SQL dialect: {0}")]
    UnknownDialect(String),
}

impl SqlError {
    /// Build a parse error from sqlparser's message.
    ///
    /// sqlparser reports the position only as text (`... at Line: 3,
    /// Column: 14`); a missing or garbled position becomes 0:0.
    pub(crate) fn from_parser_message(message: String) -> Self {
        let (line, column) = position_in(&message).unwrap_or((0, 0));
        SqlError::ParseError {
            message,
            line,
            column,
        }
    }
}

fn position_in(message: &str) -> Option<(usize, usize)> {
    let (_, rest) = message.rsplit_once("Line: ")?;
    let (line, rest) = rest.split_once(',')?;
    let (_, column) = rest.split_once("Column: ")?;
    let digits: String = column.chars().take_while(char::is_ascii_digit).collect();
    Some((line.trim().parse().ok()?, digits.parse().ok()?))
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_extracted() {
        let err = SqlError::from_parser_message(
            "sql parser error: Expected: an expression, found: EOF at Line: 3, Column: 14".to_string(),
        );
        assert!(matches!(err, SqlError::ParseError { line: 3, column: 14, .. }));
    }

    #[test]
    fn test_position_missing() {
        let err = SqlError::from_parser_message("something broke".to_string());
        assert!(matches!(err, SqlError::ParseError { line: 0, column: 0, .. }));
    }
}
