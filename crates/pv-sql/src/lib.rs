//! pv-sql - SQL parsing layer for Provisio
//!
//! This crate wraps sqlparser-rs with the PostgreSQL dialect and classifies
//! statements so the executor can tell plain data access (eligible for the
//! data-API fallback) from schema definitions and procedural blocks.

pub mod classify;
pub mod dialect;
pub mod error;
pub mod parser;

pub use classify::StatementClass;
pub use dialect::SqlDialect;
pub use error::{SqlError, SqlResult};
pub use parser::SqlParser;
