//! Probe command implementation

use anyhow::Result;
use pv_engine::ensure_exec_capability;

use crate::cli::GlobalArgs;
use crate::commands::common::{ExitCode, EXIT_WARNINGS};
use crate::context::CliContext;

/// Execute the probe command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.connect()?;

    let capability = ensure_exec_capability(&db, &ctx.settings).await;
    println!(
        "Procedure {}: {}",
        ctx.settings.procedure_name, capability
    );

    if capability.can_execute() {
        Ok(())
    } else {
        Err(ExitCode(EXIT_WARNINGS).into())
    }
}
