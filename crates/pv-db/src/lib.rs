//! pv-db - Remote database layer for Provisio
//!
//! This crate provides the `RemoteProcedure` and `DataApi` traits the
//! migration engine executes against, and a PostgREST-compatible HTTP
//! implementation of both.

pub mod error;
pub mod rest;
pub mod traits;

pub use error::{DbError, DbResult};
pub use rest::RestBackend;
pub use traits::{DataApi, RemoteDatabase, RemoteProcedure};
