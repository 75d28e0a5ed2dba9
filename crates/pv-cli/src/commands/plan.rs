//! Plan command implementation

use anyhow::Result;
use pv_core::{SchemaDescription, StatementKind};

use crate::cli::{GlobalArgs, OutputFormat, PlanArgs};
use crate::commands::common::print_json;
use crate::context::CliContext;

/// Execute the plan command
pub async fn execute(args: &PlanArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let schema = ctx.build_schema()?;
    let kind = args.kind.map(StatementKind::from);

    match args.output {
        OutputFormat::Text => {
            println!(
                "-- Schema definition: {} (schema \"{}\")",
                ctx.definition_origin, ctx.settings.schema
            );
            print!("{}", render_script(&schema, kind));
        }
        OutputFormat::Json => match kind {
            Some(kind) => print_json(&schema.of_kind(kind))?,
            None => print_json(&schema)?,
        },
    }
    Ok(())
}

/// SQL script with one header per group and one comment per statement
pub(crate) fn render_script(schema: &SchemaDescription, only: Option<StatementKind>) -> String {
    let mut out = String::new();
    for group in schema.groups() {
        if only.is_some_and(|k| k != group.kind) {
            continue;
        }
        out.push_str(&format!(
            "\n-- {} ({})\n",
            group.kind.title(),
            group.len()
        ));
        for statement in &group.statements {
            out.push_str(&format!("\n-- {}\n{}\n", statement.label, statement.sql.trim_end()));
        }
    }
    out
}

/// One line per group, for `install --dry-run`
pub(crate) fn render_summary(schema: &SchemaDescription) -> String {
    let mut out = String::new();
    for group in schema.groups() {
        out.push_str(&format!("  {:<20} {}\n", group.kind.title(), group.len()));
    }
    out.push_str(&format!("  {:<20} {}\n", "Total", schema.total_statements()));
    out
}
