//! Enroll command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;

use super::until_interrupted;
use crate::host::Simulation;
use crate::HostArgs;

/// Execute the enroll command.
pub async fn execute(host: &HostArgs, decline: bool) -> Result<()> {
    let flow = host.build_flow(Simulation {
        decline,
        ..Simulation::default()
    })?;

    let record = until_interrupted(&flow, flow.enroll())
        .await
        .context("Enrollment did not complete")?;
    info!(credential_id = %record.credential_id, "Fingerprint enrolled");

    if host.quiet {
        println!("{}", record.credential_id);
    } else {
        println!();
        println!("{}", "Fingerprint enrolled successfully!".green().bold());
        println!("   {} {}", "Credential:".dimmed(), record.credential_id);
        println!(
            "   {} {}",
            "Next:".dimmed(),
            "run `rollcall verify` to check in"
        );
    }
    Ok(())
}
