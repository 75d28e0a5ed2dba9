//! pv-engine - Migration engine for Provisio
//!
//! Applies a [`pv_core::SchemaDescription`] to a remote database: the
//! capability bootstrapper makes sure the execute-SQL procedure exists, the
//! executor runs each statement with retries and a data-API fallback, and the
//! orchestrator sequences the run and reports progress.

pub mod bootstrap;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod reporter;
pub mod settings;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use bootstrap::{ensure_exec_capability, PROBE_SQL};
pub use error::{EngineError, EngineResult};
pub use executor::{execute, ExecutionReport, Executor};
pub use orchestrator::{
    run_migration, run_migration_with, verify_installation, Completion, Orchestrator, Phase,
    RunResult, Verification,
};
pub use reporter::{LogReporter, NullReporter, Reporter, ReporterEvent};
pub use settings::EngineSettings;
