//! Remote database traits
//!
//! The traits are split by interface so that callers (and test doubles)
//! only need to provide what they use. `RemoteDatabase` bundles both for
//! the migration engine.

use crate::error::DbResult;
use async_trait::async_trait;
use pv_core::{DataRequest, Filter, OnConflict, Row};
use serde_json::Value;

/// Invocation of named server-side procedures
#[async_trait]
pub trait RemoteProcedure: Send + Sync {
    /// Call a procedure with a JSON object of named arguments.
    ///
    /// Returns the decoded response body, or `Value::Null` when the
    /// procedure returned nothing.
    async fn call_procedure(&self, name: &str, args: &Value) -> DbResult<Value>;
}

/// Per-table CRUD interface
#[async_trait]
pub trait DataApi: Send + Sync {
    /// Read up to `limit` rows from a table
    async fn select(&self, table: &str, limit: usize) -> DbResult<Vec<Row>>;

    /// Insert rows, returning the number of rows sent
    async fn insert(
        &self,
        table: &str,
        rows: &[Row],
        on_conflict: OnConflict,
        conflict_columns: &[String],
    ) -> DbResult<usize>;

    /// Update rows matching all filters, returning the number changed
    async fn update(&self, table: &str, values: &Row, filters: &[Filter]) -> DbResult<usize>;

    /// Delete rows matching all filters, returning the number removed
    async fn delete(&self, table: &str, filters: &[Filter]) -> DbResult<usize>;

    /// Dispatch a structured request to the matching method
    async fn run(&self, request: &DataRequest) -> DbResult<usize> {
        match request {
            DataRequest::Select { table, limit } => {
                self.select(table, *limit).await.map(|rows| rows.len())
            }
            DataRequest::Insert {
                table,
                rows,
                on_conflict,
                conflict_columns,
            } => {
                self.insert(table, rows, *on_conflict, conflict_columns)
                    .await
            }
            DataRequest::Update {
                table,
                values,
                filters,
            } => self.update(table, values, filters).await,
            DataRequest::Delete { table, filters } => self.delete(table, filters).await,
        }
    }
}

/// Full remote database interface used by the migration engine
pub trait RemoteDatabase: RemoteProcedure + DataApi {
    /// Backend identifier for logging
    fn backend_name(&self) -> &'static str;
}
