//! Engine settings resolved from project configuration

use crate::error::{EngineError, EngineResult};
use pv_catalog::CatalogParams;
use pv_core::{Config, RetryConfig};
use pv_db::DbError;

/// Everything the engine needs besides the connection and the catalog
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Target schema
    pub schema: String,

    /// Execute-SQL procedure name
    pub procedure_name: String,

    /// Payload field carrying the SQL text
    pub sql_param: String,

    pub retry: RetryConfig,

    /// Lower-cased substrings marking an idempotent no-op
    pub markers: Vec<String>,

    /// SQLSTATE codes marking an idempotent no-op
    pub codes: Vec<String>,

    /// Table read once after provisioning
    pub verification_table: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    /// Settings from the default connection of `config`
    pub fn from_config(config: &Config) -> Self {
        Self {
            schema: config.connection.schema.clone(),
            procedure_name: config.procedure.name.clone(),
            sql_param: config.procedure.sql_param.clone(),
            retry: config.retry.clone(),
            markers: config.idempotency.all_markers(),
            codes: config.idempotency.codes.clone(),
            verification_table: config.verification.table.clone(),
        }
    }

    /// Same settings against another schema (used for named targets)
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Same settings with a different retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Catalog parameters matching these settings
    pub fn catalog_params(&self) -> CatalogParams {
        CatalogParams {
            schema: self.schema.clone(),
            procedure_name: self.procedure_name.clone(),
            sql_param: self.sql_param.clone(),
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> EngineResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidSettings {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.markers.iter().all(|m| m.trim().is_empty()) && self.codes.is_empty() {
            return Err(EngineError::InvalidSettings {
                message: "at least one idempotency marker or code is required".to_string(),
            });
        }
        if self.procedure_name.trim().is_empty() || self.sql_param.trim().is_empty() {
            return Err(EngineError::InvalidSettings {
                message: "procedure name and sql parameter must not be empty".to_string(),
            });
        }
        if self.verification_table.trim().is_empty() {
            return Err(EngineError::InvalidSettings {
                message: "verification table must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `err` means the target already existed
    pub fn is_already_exists(&self, err: &DbError) -> bool {
        if let Some(code) = err.code() {
            if self.codes.iter().any(|c| c.eq_ignore_ascii_case(code)) {
                return true;
            }
        }
        let message = err.to_string().to_lowercase();
        self.markers
            .iter()
            .any(|m| !m.is_empty() && message.contains(m.as_str()))
    }

    /// Payload for one procedure call
    pub fn procedure_payload(&self, sql: &str) -> serde_json::Value {
        let mut payload = serde_json::Map::new();
        payload.insert(
            self.sql_param.clone(),
            serde_json::Value::String(sql.to_string()),
        );
        serde_json::Value::Object(payload)
    }
}
