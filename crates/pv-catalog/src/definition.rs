//! Declarative schema definitions
//!
//! A definition lists enums, tables, indexes, RLS policies and seed rows.
//! It is loaded from YAML and validated before anything is rendered, so a
//! definition that passes [`SchemaDefinition::validate`] always renders.

use crate::error::{CatalogError, CatalogResult};
use crate::ordering::order_tables;
use pv_core::sql_utils::is_plain_identifier;
use pv_core::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Built-in storefront definition
const STOREFRONT_YAML: &str = include_str!("../definitions/storefront.yml");

/// SQL base types accepted in column definitions (besides declared enums)
const BUILTIN_TYPES: &[&str] = &[
    "text",
    "varchar",
    "char",
    "uuid",
    "smallint",
    "integer",
    "int",
    "bigint",
    "serial",
    "bigserial",
    "numeric",
    "decimal",
    "real",
    "double precision",
    "boolean",
    "bool",
    "date",
    "time",
    "timestamp",
    "timestamptz",
    "interval",
    "json",
    "jsonb",
    "bytea",
    "inet",
];

/// Complete schema definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub enums: Vec<EnumDef>,

    #[serde(default)]
    pub tables: Vec<TableDef>,

    #[serde(default)]
    pub indexes: Vec<IndexDef>,

    #[serde(default)]
    pub policies: Vec<PolicyDef>,

    #[serde(default)]
    pub seeds: Vec<SeedDef>,
}

/// Enumerated type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// Table with columns and table-level constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDef {
    pub name: String,

    pub columns: Vec<ColumnDef>,

    /// Composite primary key; single-column keys may use `ColumnDef::primary_key`
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Multi-column unique constraints
    #[serde(default)]
    pub unique: Vec<Vec<String>>,

    /// Enable row level security on this table
    #[serde(default)]
    pub rls: bool,
}

/// One column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDef {
    pub name: String,

    /// SQL type, or the name of a declared enum
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub not_null: bool,

    #[serde(default)]
    pub unique: bool,

    /// Default value as a raw SQL expression
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub references: Option<ForeignKey>,
}

/// Foreign key target of a column
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignKey {
    pub table: String,

    #[serde(default = "default_fk_column")]
    pub column: String,

    #[serde(default)]
    pub on_delete: Option<ReferentialAction>,
}

fn default_fk_column() -> String {
    "id".to_string()
}

/// `ON DELETE` action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ReferentialAction {
    /// SQL keyword form
    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

/// Secondary index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,

    #[serde(default)]
    pub unique: bool,
}

/// Command a policy applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCommand {
    #[default]
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyCommand::All => "ALL",
            PolicyCommand::Select => "SELECT",
            PolicyCommand::Insert => "INSERT",
            PolicyCommand::Update => "UPDATE",
            PolicyCommand::Delete => "DELETE",
        };
        write!(f, "{}", s)
    }
}

/// Row level security policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDef {
    pub name: String,
    pub table: String,

    #[serde(default)]
    pub command: PolicyCommand,

    /// Roles the policy applies to; empty means `public`
    #[serde(default)]
    pub roles: Vec<String>,

    /// `USING` expression as raw SQL
    #[serde(default)]
    pub using: Option<String>,

    /// `WITH CHECK` expression as raw SQL
    #[serde(default)]
    pub with_check: Option<String>,
}

impl PolicyDef {
    /// Roles with the `public` default applied
    pub fn effective_roles(&self) -> Vec<String> {
        if self.roles.is_empty() {
            vec!["public".to_string()]
        } else {
            self.roles.clone()
        }
    }
}

/// Seed rows for one table, inserted with `ON CONFLICT DO NOTHING`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedDef {
    pub table: String,

    /// Columns of the unique key that identifies an existing row
    pub conflict_key: Vec<String>,

    pub rows: Vec<Row>,
}

impl TableDef {
    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

/// Lowercased type name without length/precision arguments or array suffix
fn base_type(data_type: &str) -> String {
    let lowered = data_type.trim().to_lowercase();
    let without_array = lowered.trim_end_matches("[]");
    let without_args = match without_array.find('(') {
        Some(pos) => &without_array[..pos],
        None => without_array,
    };
    without_args.trim().to_string()
}

fn check_identifier(value: &str, what: &str) -> CatalogResult<()> {
    if is_plain_identifier(value) {
        Ok(())
    } else {
        Err(CatalogError::InvalidDefinition {
            message: format!("{} '{}' is not a plain SQL identifier", what, value),
        })
    }
}

fn check_unique<'a>(
    names: impl IntoIterator<Item = &'a str>,
    kind: &str,
) -> CatalogResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CatalogError::DuplicateName {
                kind: kind.to_string(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

impl SchemaDefinition {
    /// The built-in storefront definition
    pub fn storefront() -> CatalogResult<Self> {
        let definition = Self::from_yaml_str(STOREFRONT_YAML, "<builtin storefront>")?;
        definition.validate()?;
        Ok(definition)
    }

    /// Parse a definition from YAML text; `origin` names it in errors
    pub fn from_yaml_str(yaml: &str, origin: &str) -> CatalogResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::DefinitionParse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Load and validate a definition file
    pub fn load(path: &Path) -> CatalogResult<Self> {
        if !path.exists() {
            return Err(CatalogError::DefinitionNotFound {
                path: path.display().to_string(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| CatalogError::DefinitionParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let definition = Self::from_yaml_str(&content, &path.display().to_string())?;
        definition.validate()?;
        log::debug!(
            "Loaded schema definition {}: {} tables, {} seeds",
            path.display(),
            definition.tables.len(),
            definition.seeds.len()
        );
        Ok(definition)
    }

    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Whether `name` is a declared enum
    pub fn is_enum(&self, name: &str) -> bool {
        self.enums.iter().any(|e| e.name == name)
    }

    /// Tables in foreign-key dependency order, ties in declaration order
    pub fn tables_in_dependency_order(&self) -> CatalogResult<Vec<&TableDef>> {
        order_tables(&self.tables)
    }

    /// Check names, references and types
    pub fn validate(&self) -> CatalogResult<()> {
        check_unique(self.enums.iter().map(|e| e.name.as_str()), "enum")?;
        check_unique(self.tables.iter().map(|t| t.name.as_str()), "table")?;
        check_unique(self.indexes.iter().map(|i| i.name.as_str()), "index")?;

        for e in &self.enums {
            check_identifier(&e.name, "enum name")?;
            if e.values.is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("enum '{}' has no values", e.name),
                });
            }
            check_unique(e.values.iter().map(String::as_str), "enum value")?;
        }

        for table in &self.tables {
            self.validate_table(table)?;
        }

        // cycle detection
        order_tables(&self.tables)?;

        for index in &self.indexes {
            check_identifier(&index.name, "index name")?;
            let context = format!("index '{}'", index.name);
            let table = self.require_table(&index.table, &context)?;
            if index.columns.is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("{} has no columns", context),
                });
            }
            require_columns(table, &index.columns, &context)?;
        }

        let mut policy_names = HashSet::new();
        for policy in &self.policies {
            let context = format!("policy '{}'", policy.name);
            if policy.name.trim().is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("policy on '{}' has an empty name", policy.table),
                });
            }
            let table = self.require_table(&policy.table, &context)?;
            if !table.rls {
                return Err(CatalogError::InvalidDefinition {
                    message: format!(
                        "{} targets table '{}' which does not enable rls",
                        context, table.name
                    ),
                });
            }
            if !policy_names.insert((policy.table.as_str(), policy.name.as_str())) {
                return Err(CatalogError::DuplicateName {
                    kind: format!("policy on {}", policy.table),
                    name: policy.name.clone(),
                });
            }
            for role in &policy.roles {
                check_identifier(role, "policy role")?;
            }
            if policy.using.is_none() && policy.with_check.is_none() {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("{} needs a using or with_check expression", context),
                });
            }
        }

        for seed in &self.seeds {
            let context = format!("seed for '{}'", seed.table);
            let table = self.require_table(&seed.table, &context)?;
            if seed.conflict_key.is_empty() {
                return Err(CatalogError::InvalidDefinition {
                    message: format!("{} has no conflict_key", context),
                });
            }
            require_columns(table, &seed.conflict_key, &context)?;
            for (i, row) in seed.rows.iter().enumerate() {
                let row_context = format!("{} row {}", context, i + 1);
                if row.is_empty() {
                    return Err(CatalogError::InvalidDefinition {
                        message: format!("{} is empty", row_context),
                    });
                }
                for column in row.keys() {
                    if !table.has_column(column) {
                        return Err(CatalogError::UnknownColumn {
                            context: row_context,
                            table: table.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
                if let Some(missing) = seed.conflict_key.iter().find(|k| !row.contains_key(*k)) {
                    return Err(CatalogError::InvalidDefinition {
                        message: format!("{} lacks conflict key column '{}'", row_context, missing),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_table(&self, table: &TableDef) -> CatalogResult<()> {
        check_identifier(&table.name, "table name")?;
        if table.columns.is_empty() {
            return Err(CatalogError::InvalidDefinition {
                message: format!("table '{}' has no columns", table.name),
            });
        }
        check_unique(
            table.columns.iter().map(|c| c.name.as_str()),
            &format!("column in {}", table.name),
        )?;

        for column in &table.columns {
            check_identifier(&column.name, "column name")?;
            let base = base_type(&column.data_type);
            if !self.is_enum(&column.data_type) && !BUILTIN_TYPES.contains(&base.as_str()) {
                return Err(CatalogError::UnknownType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    type_name: column.data_type.clone(),
                });
            }
            if let Some(fk) = &column.references {
                let context = format!("column '{}.{}'", table.name, column.name);
                let target = self.require_table(&fk.table, &context)?;
                require_columns(target, std::slice::from_ref(&fk.column), &context)?;
            }
        }

        let context = format!("table '{}'", table.name);
        require_columns(table, &table.primary_key, &context)?;
        for group in &table.unique {
            require_columns(table, group, &context)?;
        }
        let inline_keys = table.columns.iter().filter(|c| c.primary_key).count();
        if inline_keys > 1 || (inline_keys == 1 && !table.primary_key.is_empty()) {
            return Err(CatalogError::InvalidDefinition {
                message: format!("{} declares more than one primary key", context),
            });
        }
        Ok(())
    }

    fn require_table(&self, name: &str, context: &str) -> CatalogResult<&TableDef> {
        self.table(name).ok_or_else(|| CatalogError::UnknownTable {
            context: context.to_string(),
            table: name.to_string(),
        })
    }
}

fn require_columns(table: &TableDef, columns: &[String], context: &str) -> CatalogResult<()> {
    match columns.iter().find(|c| !table.has_column(c)) {
        Some(column) => Err(CatalogError::UnknownColumn {
            context: context.to_string(),
            table: table.name.clone(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
#[path = "definition_test.rs"]
mod tests;
