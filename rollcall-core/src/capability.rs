//! Platform capability detection and the page context the flow runs in.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, FlowError};

/// Whether this page can run platform credential ceremonies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// No credential API, or no user-verifying platform authenticator.
    Unsupported,
    /// Mobile browser on a non-encrypted origin.
    InsecureContext,
    /// Enrollment and verification may be offered.
    Available,
}

impl Capability {
    /// Whether the host must hide or disable the enroll/verify controls.
    pub fn is_blocking(self) -> bool {
        !matches!(self, Self::Available)
    }

    /// The descriptive, non-retryable error for a blocking capability.
    pub fn as_error(self) -> Option<FlowError> {
        match self {
            Self::Unsupported => Some(FlowError::Unsupported),
            Self::InsecureContext => Some(FlowError::InsecureContext),
            Self::Available => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported => write!(f, "unsupported"),
            Self::InsecureContext => write!(f, "insecure-context"),
            Self::Available => write!(f, "available"),
        }
    }
}

const MOBILE_MARKERS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Returns true when the user agent names a mobile platform.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    MOBILE_MARKERS.iter().any(|marker| ua.contains(marker))
}

/// Where the flow is running: origin host, transport and device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub hostname: String,
    pub secure: bool,
    pub mobile: bool,
}

impl PageContext {
    /// Build a context from the page URL and the browser user agent.
    pub fn from_location(href: &str, user_agent: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(href).map_err(|e| ConfigError::InvalidLocation(format!("{href}: {e}")))?;
        let hostname = url.host_str().unwrap_or("localhost").to_string();

        Ok(Self {
            hostname,
            secure: url.scheme() == "https",
            mobile: is_mobile_user_agent(user_agent),
        })
    }

    /// Desktop page on `http://localhost`.
    pub fn localhost() -> Self {
        Self {
            hostname: "localhost".into(),
            secure: false,
            mobile: false,
        }
    }

    /// Relying-party identifier: the page hostname, with `localhost` kept
    /// literal for local development.
    pub fn rp_id(&self) -> String {
        if self.hostname.eq_ignore_ascii_case("localhost") {
            "localhost".to_string()
        } else {
            self.hostname.clone()
        }
    }

    /// Mobile browsers refuse platform credentials on plain HTTP.
    pub fn is_insecure_mobile(&self) -> bool {
        self.mobile && !self.secure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15";
    const DESKTOP_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0";

    #[test]
    fn test_mobile_detection() {
        assert!(is_mobile_user_agent(IPHONE_UA));
        assert!(is_mobile_user_agent("Opera Mini/8.0"));
        assert!(!is_mobile_user_agent(DESKTOP_UA));
    }

    #[test]
    fn test_insecure_mobile_context() {
        let ctx = PageContext::from_location("http://192.168.1.20:5000/student", IPHONE_UA).unwrap();
        assert!(ctx.is_insecure_mobile());
        assert_eq!(ctx.rp_id(), "192.168.1.20");

        let ctx = PageContext::from_location("https://attendance.example.edu/", IPHONE_UA).unwrap();
        assert!(!ctx.is_insecure_mobile());
    }

    #[test]
    fn test_desktop_http_is_not_blocked() {
        let ctx = PageContext::from_location("http://localhost:5173/", DESKTOP_UA).unwrap();
        assert!(!ctx.is_insecure_mobile());
        assert_eq!(ctx.rp_id(), "localhost");
    }

    #[test]
    fn test_capability_display_and_blocking() {
        assert_eq!(Capability::InsecureContext.to_string(), "insecure-context");
        assert!(Capability::Unsupported.is_blocking());
        assert!(!Capability::Available.is_blocking());
        assert!(Capability::Available.as_error().is_none());
    }

    #[test]
    fn test_invalid_location() {
        assert!(PageContext::from_location("not a url", DESKTOP_UA).is_err());
    }
}
