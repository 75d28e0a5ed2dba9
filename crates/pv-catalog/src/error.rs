//! Error types for pv-catalog

use pv_core::CoreError;
use thiserror::Error;

/// Catalog definition and rendering errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Schema definition file missing (K001)
    #[error("[K001] Schema definition not found: {path}")]
    DefinitionNotFound { path: String },

    /// Schema definition is not valid YAML for the expected shape (K002)
    #[error("[K002] Failed to parse schema definition {path}: {message}")]
    DefinitionParse { path: String, message: String },

    /// Two objects of the same kind share a name (K003)
    #[error("[K003] Duplicate {kind} '{name}'")]
    DuplicateName { kind: String, name: String },

    /// Reference to a table that is not declared (K004)
    #[error("[K004] {context} references undeclared table '{table}'")]
    UnknownTable { context: String, table: String },

    /// Reference to a column the table does not have (K005)
    #[error("[K005] {context} references unknown column '{column}' of table '{table}'")]
    UnknownColumn {
        context: String,
        table: String,
        column: String,
    },

    /// Column type is neither a known SQL type nor a declared enum (K006)
    #[error("[K006] Column '{table}.{column}' has unknown type '{type_name}'")]
    UnknownType {
        table: String,
        column: String,
        type_name: String,
    },

    /// Foreign keys form a cycle (K007)
    #[error("[K007] Circular table reference: {cycle}")]
    CircularReference { cycle: String },

    /// Any other structural problem in a definition (K008)
    #[error("[K008] Invalid schema definition: {message}")]
    InvalidDefinition { message: String },

    /// Template failed to render (K009)
    #[error("[K009] Template render error: {0}")]
    RenderError(String),

    /// A rendered seed statement is not a plain INSERT (K010)
    #[error("[K010] Seed statement '{label}' is not a plain INSERT (classified as {class})")]
    SeedNotInsert { label: String, class: String },

    /// Statement model rejected the rendered catalog (K011)
    #[error("[K011] {0}")]
    Core(#[from] CoreError),
}

/// Result type alias for CatalogError
pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<minijinja::Error> for CatalogError {
    fn from(err: minijinja::Error) -> Self {
        CatalogError::RenderError(err.to_string())
    }
}
