//! pv-catalog - Statement catalog for Provisio
//!
//! Turns a declarative [`SchemaDefinition`] into the ordered
//! [`SchemaDescription`](pv_core::SchemaDescription) the migration engine
//! executes. Every statement is rendered from an embedded template with
//! identifiers quoted and literals escaped, and is written so that running
//! it against a database that already has the object is harmless.

pub mod build;
pub mod definition;
pub mod environment;
pub mod error;
mod ordering;

pub use build::{build_schema, exec_procedure_sql, CatalogParams};
pub use definition::{
    ColumnDef, EnumDef, ForeignKey, IndexDef, PolicyCommand, PolicyDef, ReferentialAction,
    SchemaDefinition, SeedDef, TableDef,
};
pub use environment::CatalogEnvironment;
pub use error::{CatalogError, CatalogResult};
