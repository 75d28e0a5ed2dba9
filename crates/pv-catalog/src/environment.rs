//! Template environment for catalog statements

use crate::error::CatalogResult;
use minijinja::{Environment, Error, ErrorKind, Value};
use pv_core::sql_utils::{json_to_sql_literal, quote_ident};
use serde::Serialize;

/// Embedded statement templates, by name
const TEMPLATES: &[(&str, &str)] = &[
    ("enum_type.sql", include_str!("../templates/enum_type.sql")),
    ("column.sql", include_str!("../templates/column.sql")),
    ("table.sql", include_str!("../templates/table.sql")),
    ("index.sql", include_str!("../templates/index.sql")),
    ("rls_enable.sql", include_str!("../templates/rls_enable.sql")),
    ("rls_policy.sql", include_str!("../templates/rls_policy.sql")),
    ("seed.sql", include_str!("../templates/seed.sql")),
    (
        "exec_procedure.sql",
        include_str!("../templates/exec_procedure.sql"),
    ),
];

/// `ident` filter: quote a SQL identifier
fn ident_filter(value: &str) -> String {
    quote_ident(value)
}

/// `literal` filter: render any value as a SQL literal
fn literal_filter(value: Value) -> Result<String, Error> {
    let json = serde_json::to_value(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot render value as SQL literal: {}", e),
        )
    })?;
    Ok(json_to_sql_literal(&json))
}

/// Minijinja environment with the catalog templates and SQL filters
pub struct CatalogEnvironment {
    env: Environment<'static>,
}

impl CatalogEnvironment {
    /// Create the environment with all embedded templates loaded
    pub fn new() -> CatalogResult<Self> {
        let mut env = Environment::new();
        env.add_filter("ident", ident_filter);
        env.add_filter("literal", literal_filter);
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        Ok(Self { env })
    }

    /// Render a named template with `ctx`, trimmed of surrounding whitespace
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> CatalogResult<String> {
        let template = self.env.get_template(name)?;
        let rendered = template.render(ctx)?;
        Ok(rendered.trim().to_string())
    }

    /// Render an ad-hoc template string
    pub fn render_str<S: Serialize>(&self, source: &str, ctx: S) -> CatalogResult<String> {
        Ok(self.env.render_str(source, ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_ident_filter() {
        let env = CatalogEnvironment::new().unwrap();
        let out = env
            .render_str("{{ name | ident }}", context! { name => "my\"table" })
            .unwrap();
        assert_eq!(out, "\"my\"\"table\"");
    }

    #[test]
    fn test_literal_filter() {
        let env = CatalogEnvironment::new().unwrap();
        let out = env
            .render_str(
                "{{ values | map('literal') | join(', ') }}",
                context! { values => vec![
                    serde_json::json!("it's"),
                    serde_json::json!(42),
                    serde_json::json!(true),
                    serde_json::Value::Null,
                ] },
            )
            .unwrap();
        assert_eq!(out, "'it''s', 42, TRUE, NULL");
    }

    #[test]
    fn test_literal_filter_object_as_json_text() {
        let env = CatalogEnvironment::new().unwrap();
        let out = env
            .render_str(
                "{{ v | literal }}",
                context! { v => serde_json::json!({"theme": "dark"}) },
            )
            .unwrap();
        assert_eq!(out, "'{\"theme\":\"dark\"}'");
    }

    #[test]
    fn test_unknown_template() {
        let env = CatalogEnvironment::new().unwrap();
        assert!(env.render("missing.sql", ()).is_err());
    }
}
