//! Configuration types and parsing for provisio.yml

use crate::error::{CoreError, CoreResult};
use crate::sql_utils::{is_plain_identifier, DEFAULT_SCHEMA};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main project configuration from provisio.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Remote database connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Generic execute-SQL procedure on the remote side
    #[serde(default)]
    pub procedure: ProcedureConfig,

    /// Retry and backoff for statement execution
    #[serde(default)]
    pub retry: RetryConfig,

    /// Error patterns that mean "the object already exists"
    #[serde(default)]
    pub idempotency: IdempotencyConfig,

    /// Post-run verification read
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Alternative schema definition file (defaults to the built-in storefront schema)
    #[serde(default)]
    pub schema_file: Option<String>,

    /// Named connection overrides (e.g., dev, staging, prod)
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,
}

/// Remote database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Base URL of the hosted backend (e.g. `https://abc.example.co`)
    #[serde(default)]
    pub url: String,

    /// Environment variable holding the service key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Target schema for every created object
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Per-request timeout enforced by the transport
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key_env: default_api_key_env(),
            schema: default_schema(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ConnectionConfig {
    /// Read the service key from the configured environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-target overrides of the connection section
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// The remote procedure used to run arbitrary SQL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcedureConfig {
    /// Procedure name
    #[serde(default = "default_procedure_name")]
    pub name: String,

    /// Name of the payload field carrying the SQL text
    #[serde(default = "default_sql_param")]
    pub sql_param: String,
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        Self {
            name: default_procedure_name(),
            sql_param: default_sql_param(),
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per statement through the procedure
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on every further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single backoff delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the zero-based `attempt` failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u64 << attempt.min(16);
        let ms = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Error patterns that identify idempotent no-ops
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdempotencyConfig {
    /// Case-insensitive substrings matched against error messages
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,

    /// SQLSTATE codes matched against structured error codes
    #[serde(default = "default_codes")]
    pub codes: Vec<String>,

    /// Extra markers appended to the defaults instead of replacing them
    #[serde(default)]
    pub extra_markers: Vec<String>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            codes: default_codes(),
            extra_markers: Vec::new(),
        }
    }
}

impl IdempotencyConfig {
    /// Lower-cased markers including the extras
    pub fn all_markers(&self) -> Vec<String> {
        self.markers
            .iter()
            .chain(self.extra_markers.iter())
            .map(|m| m.to_lowercase())
            .collect()
    }
}

/// Post-run verification read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    /// Table probed with a one-row read after provisioning
    #[serde(default = "default_verification_table")]
    pub table: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            table: default_verification_table(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "provisio".to_string(),
            connection: ConnectionConfig::default(),
            procedure: ProcedureConfig::default(),
            retry: RetryConfig::default(),
            idempotency: IdempotencyConfig::default(),
            verification: VerificationConfig::default(),
            schema_file: None,
            targets: HashMap::new(),
        }
    }
}

fn default_api_key_env() -> String {
    "PROVISIO_SERVICE_KEY".to_string()
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_procedure_name() -> String {
    "exec_sql".to_string()
}

fn default_sql_param() -> String {
    "sql".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_markers() -> Vec<String> {
    [
        "already exists",
        "duplicate object",
        "duplicate_object",
        "duplicate key value",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_codes() -> Vec<String> {
    // duplicate_object, duplicate_table, duplicate_schema, unique_violation
    ["42710", "42P07", "42P06", "23505"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_verification_table() -> String {
    "pages".to_string()
}

/// Config file names looked up in a project directory, in order
const CONFIG_FILE_NAMES: [&str; 2] = ["provisio.yml", "provisio.yaml"];

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigParseError {
                message: format!("{}: {}", path.display(), e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for provisio.yml or provisio.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }
        Err(CoreError::ConfigNotFound {
            path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
        })
    }

    /// Resolve the schema definition path relative to the project directory
    pub fn schema_file_absolute(&self, root: &Path) -> Option<PathBuf> {
        self.schema_file.as_ref().map(|p| root.join(p))
    }

    /// Connection settings with the named target's overrides applied
    pub fn connection_for(&self, target: Option<&str>) -> CoreResult<ConnectionConfig> {
        let Some(name) = target else {
            return Ok(self.connection.clone());
        };

        let overrides = self.targets.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.targets.keys().map(String::as_str).collect();
            available.sort_unstable();
            CoreError::UnknownTarget {
                name: name.to_string(),
                available: if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                },
            }
        })?;

        let mut conn = self.connection.clone();
        if let Some(url) = &overrides.url {
            conn.url = url.clone();
        }
        if let Some(env) = &overrides.api_key_env {
            conn.api_key_env = env.clone();
        }
        if let Some(schema) = &overrides.schema {
            conn.schema = schema.clone();
        }
        if let Some(timeout) = overrides.timeout_secs {
            conn.timeout_secs = timeout;
        }
        Ok(conn)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("Project name cannot be empty"));
        }

        validate_connection(&self.connection, "connection")?;
        for (name, target) in &self.targets {
            if let Some(url) = &target.url {
                validate_url(url, &format!("targets.{}.url", name))?;
            }
            if let Some(schema) = &target.schema {
                validate_identifier(schema, &format!("targets.{}.schema", name))?;
            }
        }

        validate_identifier(&self.procedure.name, "procedure.name")?;
        validate_identifier(&self.procedure.sql_param, "procedure.sql_param")?;

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(invalid(
                "retry.max_delay_ms must be greater than or equal to retry.base_delay_ms",
            ));
        }

        if self
            .idempotency
            .markers
            .iter()
            .chain(self.idempotency.extra_markers.iter())
            .any(|m| m.trim().is_empty())
        {
            return Err(invalid("idempotency markers cannot be empty strings"));
        }

        validate_identifier(&self.verification.table, "verification.table")?;

        Ok(())
    }
}

fn invalid(message: &str) -> CoreError {
    CoreError::ConfigInvalid {
        message: message.to_string(),
    }
}

fn validate_connection(conn: &ConnectionConfig, field: &str) -> CoreResult<()> {
    if !conn.url.is_empty() {
        validate_url(&conn.url, &format!("{}.url", field))?;
    }
    validate_identifier(&conn.schema, &format!("{}.schema", field))?;
    if conn.api_key_env.trim().is_empty() {
        return Err(CoreError::ConfigInvalid {
            message: format!("{}.api_key_env cannot be empty", field),
        });
    }
    if conn.timeout_secs == 0 {
        return Err(CoreError::ConfigInvalid {
            message: format!("{}.timeout_secs must be at least 1", field),
        });
    }
    Ok(())
}

fn validate_url(url: &str, field: &str) -> CoreResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!("{} must start with http:// or https://, got '{}'", field, url),
        })
    }
}

fn validate_identifier(value: &str, field: &str) -> CoreResult<()> {
    if is_plain_identifier(value) {
        Ok(())
    } else {
        Err(CoreError::ConfigInvalid {
            message: format!("{} must be a plain SQL identifier, got '{}'", field, value),
        })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
