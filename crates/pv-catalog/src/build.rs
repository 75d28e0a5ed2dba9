//! Rendering a definition into an ordered statement catalog

use crate::definition::{ColumnDef, PolicyDef, SchemaDefinition, SeedDef, TableDef};
use crate::environment::CatalogEnvironment;
use crate::error::{CatalogError, CatalogResult};
use minijinja::context;
use pv_core::sql_utils::{is_plain_identifier, quote_ident, DEFAULT_SCHEMA};
use pv_core::{
    Config, DataRequest, OnConflict, Row, SchemaDescription, Statement, StatementGroup,
    StatementKind,
};
use pv_sql::{SqlParser, StatementClass};

/// Parameters that vary per installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogParams {
    /// Schema every object is created in
    pub schema: String,

    /// Name of the execute-SQL helper procedure
    pub procedure_name: String,

    /// Name of the procedure's SQL text argument
    pub sql_param: String,
}

impl Default for CatalogParams {
    fn default() -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            procedure_name: "exec_sql".to_string(),
            sql_param: "sql".to_string(),
        }
    }
}

impl CatalogParams {
    /// Parameters from a project config's default connection and procedure
    pub fn from_config(config: &Config) -> Self {
        Self {
            schema: config.connection.schema.clone(),
            procedure_name: config.procedure.name.clone(),
            sql_param: config.procedure.sql_param.clone(),
        }
    }

    /// Same parameters with a different target schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    fn validate(&self) -> CatalogResult<()> {
        for (value, what) in [
            (&self.schema, "schema"),
            (&self.procedure_name, "procedure name"),
            (&self.sql_param, "procedure argument"),
        ] {
            if !is_plain_identifier(value) {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("{} '{}' is not a plain SQL identifier", what, value),
                });
            }
        }
        Ok(())
    }
}

/// Render `definition` into the ordered catalog of idempotent statements.
///
/// Groups follow the canonical order (enum types, tables, indexes, RLS
/// enables, policies, seed rows); kinds with no statements are omitted.
/// Tables are ordered by foreign-key dependency. Pure: performs no I/O.
pub fn build_schema(
    definition: &SchemaDefinition,
    params: &CatalogParams,
) -> CatalogResult<SchemaDescription> {
    params.validate()?;
    definition.validate()?;

    let env = CatalogEnvironment::new()?;
    let renderer = Renderer {
        env: &env,
        definition,
        schema: &params.schema,
    };

    let mut groups = Vec::with_capacity(StatementKind::ALL.len());
    let mut push = |kind: StatementKind, statements: Vec<Statement>| {
        if !statements.is_empty() {
            groups.push(StatementGroup::new(kind, statements));
        }
    };

    push(
        StatementKind::EnumType,
        definition
            .enums
            .iter()
            .map(|e| -> CatalogResult<Statement> {
                let sql = env.render(
                    "enum_type.sql",
                    context! { schema => &params.schema, name => &e.name, values => &e.values },
                )?;
                Ok(Statement::new(format!("Create enum type {}", e.name), sql))
            })
            .collect::<CatalogResult<_>>()?,
    );

    let ordered = definition.tables_in_dependency_order()?;
    push(
        StatementKind::Table,
        ordered
            .iter()
            .map(|t| renderer.table(t))
            .collect::<CatalogResult<_>>()?,
    );

    push(
        StatementKind::Index,
        definition
            .indexes
            .iter()
            .map(|i| -> CatalogResult<Statement> {
                let sql = env.render(
                    "index.sql",
                    context! {
                        schema => &params.schema,
                        name => &i.name,
                        table => &i.table,
                        columns => &i.columns,
                        unique => i.unique,
                    },
                )?;
                Ok(Statement::new(format!("Create index {}", i.name), sql))
            })
            .collect::<CatalogResult<_>>()?,
    );

    push(
        StatementKind::RlsEnable,
        ordered
            .iter()
            .filter(|t| t.rls)
            .map(|t| -> CatalogResult<Statement> {
                let sql = env.render(
                    "rls_enable.sql",
                    context! { schema => &params.schema, table => &t.name },
                )?;
                Ok(Statement::new(format!("Enable RLS on {}", t.name), sql))
            })
            .collect::<CatalogResult<_>>()?,
    );

    push(
        StatementKind::RlsPolicy,
        definition
            .policies
            .iter()
            .map(|p| renderer.policy(p))
            .collect::<CatalogResult<_>>()?,
    );

    let parser = SqlParser::postgres();
    let mut seeds = Vec::new();
    for seed in &definition.seeds {
        for row in &seed.rows {
            let statement = renderer.seed_row(seed, row)?;
            let class = parser.classify(&statement.sql);
            if class != StatementClass::Insert {
                return Err(CatalogError::SeedNotInsert {
                    label: statement.label,
                    class: class.to_string(),
                });
            }
            seeds.push(statement);
        }
    }
    push(StatementKind::SeedData, seeds);

    let description = SchemaDescription::new(groups)?;
    log::debug!(
        "Built catalog for schema '{}': {} statements in {} groups",
        params.schema,
        description.total_statements(),
        description.groups().len()
    );
    Ok(description)
}

/// `CREATE OR REPLACE FUNCTION` statement for the execute-SQL procedure
pub fn exec_procedure_sql(params: &CatalogParams) -> CatalogResult<String> {
    params.validate()?;
    let env = CatalogEnvironment::new()?;
    env.render(
        "exec_procedure.sql",
        context! {
            schema => &params.schema,
            name => &params.procedure_name,
            param => &params.sql_param,
        },
    )
}

struct Renderer<'a> {
    env: &'a CatalogEnvironment,
    definition: &'a SchemaDefinition,
    schema: &'a str,
}

impl Renderer<'_> {
    fn column(&self, column: &ColumnDef) -> CatalogResult<String> {
        let type_sql = if self.definition.is_enum(&column.data_type) {
            format!(
                "{}.{}",
                quote_ident(self.schema),
                quote_ident(&column.data_type)
            )
        } else {
            column.data_type.clone()
        };
        let references = column.references.as_ref().map(|fk| {
            context! {
                table => &fk.table,
                column => &fk.column,
                on_delete => fk.on_delete.map(|a| a.as_sql()),
            }
        });
        self.env.render(
            "column.sql",
            context! {
                schema => self.schema,
                name => &column.name,
                type_sql => type_sql,
                primary_key => column.primary_key,
                not_null => column.not_null,
                unique => column.unique,
                default => &column.default,
                references => references,
            },
        )
    }

    fn table(&self, table: &TableDef) -> CatalogResult<Statement> {
        let columns = table
            .columns
            .iter()
            .map(|c| self.column(c))
            .collect::<CatalogResult<Vec<_>>>()?;
        let sql = self.env.render(
            "table.sql",
            context! {
                schema => self.schema,
                name => &table.name,
                columns => columns,
                primary_key => &table.primary_key,
                unique => &table.unique,
            },
        )?;
        Ok(Statement::new(format!("Create table {}", table.name), sql))
    }

    fn policy(&self, policy: &PolicyDef) -> CatalogResult<Statement> {
        let sql = self.env.render(
            "rls_policy.sql",
            context! {
                schema => self.schema,
                name => &policy.name,
                table => &policy.table,
                command => policy.command.to_string(),
                roles => policy.effective_roles(),
                using => &policy.using,
                with_check => &policy.with_check,
            },
        )?;
        Ok(Statement::new(
            format!("Create policy \"{}\" on {}", policy.name, policy.table),
            sql,
        ))
    }

    fn seed_row(&self, seed: &SeedDef, row: &Row) -> CatalogResult<Statement> {
        let columns: Vec<&String> = row.keys().collect();
        let values: Vec<&serde_json::Value> = row.values().collect();
        let sql = self.env.render(
            "seed.sql",
            context! {
                schema => self.schema,
                table => &seed.table,
                columns => columns,
                values => values,
                conflict_key => &seed.conflict_key,
            },
        )?;
        let request = DataRequest::Insert {
            table: seed.table.clone(),
            rows: vec![row.clone()],
            on_conflict: OnConflict::Ignore,
            conflict_columns: seed.conflict_key.clone(),
        };
        Ok(Statement::new(seed_label(seed, row), sql).with_data_request(request))
    }
}

/// `Seed site_settings (key=site_name)`
fn seed_label(seed: &SeedDef, row: &Row) -> String {
    let key = seed
        .conflict_key
        .iter()
        .map(|k| {
            let value = match row.get(k) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            format!("{}={}", k, value)
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("Seed {} ({})", seed.table, key)
}

#[cfg(test)]
#[path = "build_test.rs"]
mod tests;
