//! Status and capability commands.

use anyhow::Result;
use colored::Colorize;
use rollcall_core::{Capability, KeyValueStore, USER_EMAIL_KEY};

use crate::host::Simulation;
use crate::HostArgs;

fn describe(capability: Capability) -> colored::ColoredString {
    match capability {
        Capability::Available => "available".green(),
        Capability::Unsupported => "unsupported".red(),
        Capability::InsecureContext => "insecure context".yellow(),
    }
}

/// Execute the capability command.
pub async fn capability(host: &HostArgs) -> Result<()> {
    let flow = host.build_flow(Simulation::default())?;
    let capability = flow.check_capability().await;

    if host.quiet {
        println!("{capability}");
    } else {
        println!("{} {}", "Biometric authentication:".dimmed(), describe(capability));
        if let Some(err) = capability.as_error() {
            println!("   {}", err.to_string().yellow());
        }
    }
    Ok(())
}

/// Execute the status command.
pub async fn execute(host: &HostArgs) -> Result<()> {
    let flow = host.build_flow(Simulation::default())?;
    let capability = flow.check_capability().await;
    let enrollment = flow.enrollment()?;
    let signed_in = host.page_store().get(USER_EMAIL_KEY)?;

    println!("   {} {}", "Origin:".dimmed(), host.origin);
    println!("   {} {}", "Store:".dimmed(), host.store.display());
    println!("   {} {}", "Biometrics:".dimmed(), describe(capability));
    match enrollment {
        Some(record) => println!(
            "   {} {} ({})",
            "Fingerprint:".dimmed(),
            "enrolled".green(),
            record.credential_id
        ),
        None => println!("   {} {}", "Fingerprint:".dimmed(), "not enrolled".yellow()),
    }
    println!(
        "   {} {}",
        "Signed in:".dimmed(),
        signed_in.as_deref().unwrap_or("-")
    );
    Ok(())
}
