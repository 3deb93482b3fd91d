//! Verify command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::Verdict;

use super::until_interrupted;
use crate::host::Simulation;
use crate::HostArgs;

/// Print a verdict as JSON or a human summary.
pub fn report(verdict: &Verdict, json: bool, quiet: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(verdict)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }
    println!();
    println!("{}", "Identity verified. Attendance can be marked.".green().bold());
    if let Some(id) = &verdict.credential_id {
        println!("   {} {}", "Credential:".dimmed(), id);
    }
    if verdict.simulated {
        println!("   {} {}", "Check:".dimmed(), "simulated (no face matching)".yellow());
    }
    println!(
        "   {} {}",
        "Verified at:".dimmed(),
        verdict.verified_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// Execute the verify command.
pub async fn execute(host: &HostArgs, decline: bool, json: bool) -> Result<()> {
    let flow = host.build_flow(Simulation {
        decline,
        ..Simulation::default()
    })?;

    let verdict = until_interrupted(&flow, flow.verify())
        .await
        .context("Verification did not complete")?;
    report(&verdict, json, host.quiet)
}
