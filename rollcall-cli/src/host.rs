//! Wiring between CLI options and the verification flow.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use colored::Colorize;
use rollcall_core::{
    FlowConfig, FlowObserver, FlowState, FlowTimings, IdentityVerificationFlow, PageContext,
    TokioTimer, Verdict,
};

use crate::platform::{SimulatedAuthenticator, SimulatedCamera};
use crate::store::FileStore;
use crate::HostArgs;

/// Per-invocation device behaviour.
#[derive(Debug, Default, Clone, Copy)]
pub struct Simulation {
    /// Dismiss the fingerprint prompt.
    pub decline: bool,
    /// Deny camera permission.
    pub deny_camera: bool,
}

impl HostArgs {
    pub fn page_store(&self) -> FileStore {
        FileStore::new(&self.store)
    }

    /// Credential registry of the simulated authenticator, beside the page store.
    pub fn keychain_path(&self) -> PathBuf {
        let mut name = self
            .store
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".rollcall.json".into());
        name.push(".keychain");
        self.store.with_file_name(name)
    }

    pub fn page_context(&self) -> Result<PageContext> {
        let mut context = PageContext::from_location(&self.origin, "")
            .with_context(|| format!("Invalid --origin {}", self.origin))?;
        context.mobile = self.mobile;
        Ok(context)
    }

    pub fn flow_config(&self) -> Result<FlowConfig> {
        let config = FlowConfig::from_env().context("Invalid flow configuration")?;
        Ok(if self.no_pacing {
            config.with_timings(FlowTimings::instant())
        } else {
            config
        })
    }

    pub fn build_flow(&self, simulation: Simulation) -> Result<IdentityVerificationFlow> {
        let authenticator = SimulatedAuthenticator::new(
            FileStore::new(self.keychain_path()),
            !self.no_sensor,
            simulation.decline,
        );
        let flow = IdentityVerificationFlow::builder(
            Rc::new(authenticator),
            Rc::new(SimulatedCamera::new(simulation.deny_camera)),
            Rc::new(self.page_store()),
            Rc::new(TokioTimer),
        )
        .context(self.page_context()?)
        .config(self.flow_config()?)
        .observer(Rc::new(TerminalObserver { quiet: self.quiet }))
        .build();
        Ok(flow)
    }
}

/// Prints what a modal would show at each step.
struct TerminalObserver {
    quiet: bool,
}

impl FlowObserver for TerminalObserver {
    fn on_state_change(&self, from: FlowState, to: FlowState) {
        if self.quiet {
            return;
        }
        let line = match to {
            FlowState::Enrolling => "Touch your fingerprint sensor to enroll...".cyan(),
            FlowState::Verifying if from == FlowState::Camera => "Analyzing face...".cyan(),
            FlowState::Verifying => "Touch your fingerprint sensor...".cyan(),
            FlowState::Camera => "Camera ready. Position your face in the frame.".cyan(),
            FlowState::Success => "Success!".green().bold(),
            FlowState::Failed => "Verification failed.".red().bold(),
            FlowState::Idle => return,
        };
        eprintln!("{line}");
    }

    fn on_success(&self, verdict: &Verdict) {
        tracing::info!(strategy = ?verdict.strategy, "Attendance can be marked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Args {
        #[command(flatten)]
        host: HostArgs,
    }

    fn host(args: &[&str]) -> HostArgs {
        Args::parse_from(std::iter::once("rollcall").chain(args.iter().copied())).host
    }

    #[test]
    fn test_keychain_sits_beside_store() {
        let host = host(&["--store", "/tmp/data/page.json"]);
        assert_eq!(host.keychain_path(), PathBuf::from("/tmp/data/page.json.keychain"));
    }

    #[test]
    fn test_mobile_http_page_is_insecure() {
        let context = host(&["--origin", "http://192.168.1.20:5000", "--mobile"])
            .page_context()
            .unwrap();
        assert!(context.is_insecure_mobile());
        assert_eq!(context.rp_id(), "192.168.1.20");
    }

    #[test]
    fn test_no_pacing_zeroes_timings() {
        let config = host(&["--no-pacing"]).flow_config().unwrap();
        assert_eq!(config.timings, FlowTimings::instant());
    }
}
