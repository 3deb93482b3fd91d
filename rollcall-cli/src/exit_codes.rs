//! Exit codes following sysexits.h conventions.
//!
//! Scripts wrapping `rollcall` (kiosk check-in, CI) branch on these.

use rollcall_core::{FlowError, SessionError};

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Invalid arguments or configuration.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The user was not verified (rejected, cancelled, null assertion).
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Nothing enrolled to verify against.
/// Maps to EX_NOINPUT from sysexits.h.
pub const NOT_ENROLLED: i32 = 66;

/// No usable authenticator or camera on this device/page.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Store read/write failure.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Flow busy or closed; trying again may work.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TEMP_FAILURE: i32 = 75;

/// E-mail not on the roster.
/// Maps to EX_NOPERM from sysexits.h.
pub const NOT_AUTHORIZED: i32 = 77;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_flow_error(err: &FlowError) -> i32 {
        match err {
            FlowError::NotAllowed(_)
            | FlowError::Aborted(_)
            | FlowError::Failed(_)
            | FlowError::Security
            | FlowError::AlreadyEnrolled => VERIFICATION_FAILED,
            FlowError::NoEnrollment => NOT_ENROLLED,
            FlowError::Unsupported
            | FlowError::InsecureContext
            | FlowError::SensorUnavailable
            | FlowError::CameraUnavailable(_) => UNAVAILABLE,
            FlowError::CameraBusy | FlowError::Busy(_) | FlowError::Cancelled => TEMP_FAILURE,
            FlowError::Storage(_) => IO_ERROR,
            FlowError::Entropy(_) => GENERAL_ERROR,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first typed error in the chain
        let code = err
            .chain()
            .find_map(|cause| {
                if let Some(flow) = cause.downcast_ref::<FlowError>() {
                    Some(Self::from_flow_error(flow))
                } else if let Some(session) = cause.downcast_ref::<SessionError>() {
                    Some(match session {
                        SessionError::NotAuthorized(_) => NOT_AUTHORIZED,
                        SessionError::InvalidRoster(_) => USAGE_ERROR,
                        SessionError::Storage(_) => IO_ERROR,
                    })
                } else if cause.is::<rollcall_core::ConfigError>() {
                    Some(USAGE_ERROR)
                } else if cause.is::<rollcall_core::StoreError>() || cause.is::<std::io::Error>() {
                    Some(IO_ERROR)
                } else {
                    None
                }
            })
            .unwrap_or(GENERAL_ERROR);

        Self {
            code,
            message: Some(message),
        }
    }
}
