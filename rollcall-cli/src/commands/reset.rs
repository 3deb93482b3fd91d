//! Reset command implementation.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::host::Simulation;
use crate::HostArgs;

/// Execute the reset command.
pub fn execute(host: &HostArgs) -> Result<()> {
    let flow = host.build_flow(Simulation::default())?;
    let was_enrolled = flow.is_enrolled();
    flow.reset_enrollment()
        .context("Failed to reset enrollment")?;

    if !host.quiet {
        if was_enrolled {
            println!("{}", "Fingerprint enrollment removed.".green());
        } else {
            println!("{}", "No fingerprint was enrolled.".dimmed());
        }
    }
    Ok(())
}
