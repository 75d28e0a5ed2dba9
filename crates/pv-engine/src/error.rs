//! Error types for pv-engine

use pv_catalog::CatalogError;
use pv_core::CoreError;
use thiserror::Error;

/// Fatal migration errors.
///
/// Remote statement failures never surface here; they are recorded in the
/// run result. These variants are programming or configuration faults.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine settings are unusable (X001)
    #[error("[X001] Invalid engine settings: {message}")]
    InvalidSettings { message: String },

    /// Catalog could not be built (X002)
    #[error("[X002] {0}")]
    Catalog(#[from] CatalogError),

    /// Statement model rejected input (X003)
    #[error("[X003] {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;
