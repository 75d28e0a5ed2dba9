//! Verify command implementation

use anyhow::Result;
use pv_engine::verify_installation;

use crate::cli::GlobalArgs;
use crate::commands::common::{ExitCode, EXIT_WARNINGS};
use crate::context::CliContext;

/// Execute the verify command
pub async fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = CliContext::load(global)?;
    let db = ctx.connect()?;

    let table = &ctx.settings.verification_table;
    let (_, installation) = verify_installation(&db, table).await;
    println!("Installation ({}): {}", table, installation);

    if installation.is_installed() {
        Ok(())
    } else {
        Err(ExitCode(EXIT_WARNINGS).into())
    }
}
