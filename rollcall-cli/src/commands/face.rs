//! Camera fallback command.

use anyhow::{Context, Result};
use tracing::warn;

use super::until_interrupted;
use super::verify::report;
use crate::host::Simulation;
use crate::HostArgs;

/// Execute the face command: open the camera, then run the face check.
pub async fn execute(host: &HostArgs, deny_camera: bool, json: bool) -> Result<()> {
    let flow = host.build_flow(Simulation {
        deny_camera,
        ..Simulation::default()
    })?;
    warn!("Face check is simulated; no face matching takes place");

    until_interrupted(&flow, flow.use_camera_fallback())
        .await
        .context("Camera fallback unavailable")?;
    let verdict = until_interrupted(&flow, flow.confirm_face())
        .await
        .context("Face check did not complete")?;

    report(&verdict, json, host.quiet)
}
