//! Runtime context for CLI commands

use anyhow::{Context, Result};
use pv_catalog::{build_schema, SchemaDefinition};
use pv_core::{Config, ConnectionConfig, CoreError, SchemaDescription};
use pv_db::RestBackend;
use pv_engine::EngineSettings;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Configuration, connection and schema definition resolved from the
/// command line and the project directory
pub(crate) struct CliContext {
    /// Connection after target and `--url` overrides
    pub connection: ConnectionConfig,

    pub settings: EngineSettings,

    pub definition: SchemaDefinition,

    /// Where the definition came from, for display
    pub definition_origin: String,
}

impl CliContext {
    /// Resolve everything a command needs without touching the network
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&global.project_dir);
        let config = load_config(global, &root)?;

        let mut connection = config
            .connection_for(global.target.as_deref())
            .context("Failed to resolve connection target")?;
        if let Some(url) = &global.url {
            connection.url = url.clone();
        }

        let settings = EngineSettings::from_config(&config).with_schema(connection.schema.clone());

        let schema_file = global
            .schema_file
            .as_ref()
            .map(|p| root.join(p))
            .or_else(|| config.schema_file_absolute(&root));
        let (definition, definition_origin) = match schema_file {
            Some(path) => {
                let definition = SchemaDefinition::load(&path)
                    .with_context(|| format!("Failed to load schema definition {}", path.display()))?;
                (definition, path.display().to_string())
            }
            None => (
                SchemaDefinition::storefront().context("Built-in schema definition is invalid")?,
                "built-in storefront".to_string(),
            ),
        };

        Ok(Self {
            connection,
            settings,
            definition,
            definition_origin,
        })
    }

    /// Render the statement catalog for the resolved schema
    pub fn build_schema(&self) -> Result<SchemaDescription> {
        build_schema(&self.definition, &self.settings.catalog_params())
            .context("Failed to build statement catalog")
    }

    /// HTTP backend for the resolved connection
    pub fn connect(&self) -> Result<RestBackend> {
        let backend = RestBackend::from_connection(&self.connection)
            .context("Failed to configure database connection")?;
        log::debug!("Using backend at {}", backend.base_url());
        Ok(backend)
    }
}

/// `--config` wins; otherwise the project directory, falling back to
/// defaults when it has no config file
fn load_config(global: &GlobalArgs, root: &Path) -> Result<Config> {
    if let Some(path) = &global.config {
        return Config::load(Path::new(path)).context("Failed to load configuration file");
    }
    match Config::load_from_dir(root) {
        Ok(config) => Ok(config),
        Err(CoreError::ConfigNotFound { path }) => {
            log::debug!("No config at {}, using defaults", path);
            Ok(Config::default())
        }
        Err(err) => Err(err).context("Failed to load project configuration"),
    }
}
