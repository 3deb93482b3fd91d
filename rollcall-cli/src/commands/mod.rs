//! Subcommand implementations.

use std::future::Future;

use rollcall_core::{FlowError, IdentityVerificationFlow};
use tracing::warn;

pub mod enroll;
pub mod face;
pub mod reset;
pub mod session;
pub mod status;
pub mod verify;

/// Run a flow operation, closing the flow if the user hits Ctrl-C.
pub async fn until_interrupted<T>(
    flow: &IdentityVerificationFlow,
    operation: impl Future<Output = rollcall_core::Result<T>>,
) -> rollcall_core::Result<T> {
    tokio::select! {
        result = operation => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            flow.close();
            Err(FlowError::Cancelled)
        }
    }
}
