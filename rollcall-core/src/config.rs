//! Flow configuration
//!
//! Relying-party naming, the user entity sent with enrollment, ceremony
//! timeout and pacing. Loadable from environment variables with defaults.

use std::time::Duration;

use crate::error::ConfigError;
use crate::timer::FlowTimings;

/// Flow configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowConfig {
    /// Relying party display name (default: "Smart Attendance System")
    pub rp_name: String,
    /// User name sent with the creation request (default: "student@attendance.edu")
    pub user_name: String,
    /// User display name (default: "Student User")
    pub user_display_name: String,
    /// Ceremony timeout in milliseconds (default: 60000)
    pub ceremony_timeout_ms: u32,
    /// Pacing pauses
    pub timings: FlowTimings,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            rp_name: "Smart Attendance System".to_string(),
            user_name: "student@attendance.edu".to_string(),
            user_display_name: "Student User".to_string(),
            ceremony_timeout_ms: 60_000,
            timings: FlowTimings::default(),
        }
    }
}

impl FlowConfig {
    /// Load configuration from environment variables
    ///
    /// - `ROLLCALL_RP_NAME`
    /// - `ROLLCALL_USER_NAME`
    /// - `ROLLCALL_USER_DISPLAY_NAME`
    /// - `ROLLCALL_CEREMONY_TIMEOUT_MS`
    /// - `ROLLCALL_SUCCESS_DELAY_MS` (post-success display for every path)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rp_name = std::env::var("ROLLCALL_RP_NAME").unwrap_or(defaults.rp_name);
        let user_name = std::env::var("ROLLCALL_USER_NAME").unwrap_or(defaults.user_name);
        let user_display_name =
            std::env::var("ROLLCALL_USER_DISPLAY_NAME").unwrap_or(defaults.user_display_name);

        let ceremony_timeout_ms = match std::env::var("ROLLCALL_CEREMONY_TIMEOUT_MS") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "ROLLCALL_CEREMONY_TIMEOUT_MS",
                value: v,
            })?,
            Err(_) => defaults.ceremony_timeout_ms,
        };

        let timings = match std::env::var("ROLLCALL_SUCCESS_DELAY_MS") {
            Ok(v) => {
                let ms: u64 = v.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "ROLLCALL_SUCCESS_DELAY_MS",
                    value: v,
                })?;
                defaults
                    .timings
                    .with_success_delay(Duration::from_millis(ms))
            }
            Err(_) => defaults.timings,
        };

        Ok(Self {
            rp_name,
            user_name,
            user_display_name,
            ceremony_timeout_ms,
            timings,
        })
    }

    pub fn with_timings(mut self, timings: FlowTimings) -> Self {
        self.timings = timings;
        self
    }
}
