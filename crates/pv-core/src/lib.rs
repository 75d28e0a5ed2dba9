//! pv-core - Core library for Provisio
//!
//! This crate provides the shared types used across all Provisio components:
//! the statement model consumed by the migration engine, per-run state,
//! capability and installation status, configuration parsing, and SQL
//! quoting helpers.

pub mod capability;
pub mod config;
pub mod error;
pub mod installation;
pub mod run_state;
pub mod sql_utils;
pub mod statement;

pub use capability::CapabilityState;
pub use config::{Config, ConnectionConfig, IdempotencyConfig, ProcedureConfig, RetryConfig};
pub use error::{CoreError, CoreResult};
pub use installation::InstallationStatus;
pub use run_state::{RunState, RunSummary};
pub use statement::{
    DataRequest, ExecutionOutcome, ExecutionPath, Filter, OnConflict, Row, SchemaDescription,
    Statement, StatementGroup, StatementKind,
};
