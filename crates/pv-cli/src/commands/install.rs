//! Install command implementation

use anyhow::Result;
use pv_engine::{Completion, Orchestrator, RunResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cli::{GlobalArgs, InstallArgs, OutputFormat};
use crate::commands::common::{print_json, CliReporter, ExitCode, EXIT_WARNINGS};
use crate::commands::plan::render_summary;
use crate::context::CliContext;

/// Execute the install command
pub async fn execute(args: &InstallArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let schema = ctx.build_schema()?;

    if args.dry_run {
        println!(
            "Dry run: {} statement(s) from {} into schema \"{}\"",
            schema.total_statements(),
            ctx.definition_origin,
            ctx.settings.schema
        );
        print!("{}", render_summary(&schema));
        return Ok(());
    }

    let db = ctx.connect()?;

    // Ctrl-C stops the run between statements
    let abort = Arc::new(AtomicBool::new(false));
    let abort_signal = Arc::clone(&abort);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current statement");
            abort_signal.store(true, Ordering::SeqCst);
        }
    });

    let mut reporter = match args.output {
        OutputFormat::Text => {
            println!(
                "Installing {} statement(s) into schema \"{}\"...",
                schema.total_statements(),
                ctx.settings.schema
            );
            CliReporter::progress(schema.total_statements())
        }
        OutputFormat::Json => CliReporter::JsonLines,
    };

    let result = Orchestrator::new(&db, &ctx.settings)
        .with_abort_flag(abort)
        .run(&schema, &mut reporter)
        .await?;
    reporter.finish();

    match args.output {
        OutputFormat::Text => print_text_result(&result),
        OutputFormat::Json => print_json(&result)?,
    }

    match result.completion() {
        Completion::Success => Ok(()),
        Completion::CompletedWithWarnings => Err(ExitCode(EXIT_WARNINGS).into()),
    }
}

fn print_text_result(result: &RunResult) {
    let summary = &result.summary;
    println!();
    println!("Capability: {}", result.capability);
    println!(
        "Statements: {} applied, {} already present, {} failed ({} via data API)",
        summary.succeeded, summary.skipped_existing, summary.failed, summary.via_fallback
    );
    if !result.errors.is_empty() {
        println!();
        println!("Errors:");
        for error in &result.errors {
            println!("  - {}", error);
        }
    }
    println!("Installation: {}", result.installation);
    println!();
    println!("{} ({}ms)", result.banner(), summary.duration_ms);
}
