use thiserror::Error;

use crate::flow::FlowState;

/// Which credential ceremony produced an error.
///
/// The platform reports the same error names for both ceremonies, but the
/// user-facing wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceremony {
    Enroll,
    Verify,
}

impl Ceremony {
    fn not_allowed_message(self) -> &'static str {
        match self {
            Self::Enroll => "Permission denied. Please enable biometric authentication.",
            Self::Verify => "Fingerprint not recognized or operation cancelled.",
        }
    }

    fn aborted_message(self) -> &'static str {
        match self {
            Self::Enroll => "Operation cancelled. Please try again.",
            Self::Verify => "Verification cancelled. Please try again.",
        }
    }

    fn failed_message(self) -> &'static str {
        match self {
            Self::Enroll => "Fingerprint enrollment failed.",
            Self::Verify => "Fingerprint verification failed.",
        }
    }
}

/// Errors surfaced by the identity-verification flow.
///
/// `Display` renders the message shown to the user. None of these are
/// retried automatically.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Biometric authentication not supported on this device")]
    Unsupported,

    #[error("Biometric authentication requires HTTPS on mobile devices. Please use a secure connection.")]
    InsecureContext,

    #[error("Device fingerprint sensor not available")]
    SensorUnavailable,

    #[error("{}", .0.not_allowed_message())]
    NotAllowed(Ceremony),

    #[error("Security error. Please ensure you're using HTTPS.")]
    Security,

    #[error("{}", .0.aborted_message())]
    Aborted(Ceremony),

    #[error("Device is already enrolled. Try verification instead.")]
    AlreadyEnrolled,

    #[error("Please enroll your fingerprint first")]
    NoEnrollment,

    #[error("{}", .0.failed_message())]
    Failed(Ceremony),

    #[error("Camera access denied or not available. Please use fingerprint verification.")]
    CameraUnavailable(#[source] CameraError),

    #[error("A camera stream is already open.")]
    CameraBusy,

    #[error("Verification already in progress.")]
    Busy(FlowState),

    #[error("Verification session was closed.")]
    Cancelled,

    #[error("Unable to access enrollment storage: {0}")]
    Storage(#[from] StoreError),

    #[error("Unable to generate a secure challenge: {0}")]
    Entropy(String),
}

impl FlowError {
    /// Map a platform ceremony error to the flow taxonomy.
    pub fn from_ceremony(ceremony: Ceremony, err: CeremonyError) -> Self {
        match (ceremony, err) {
            (Ceremony::Enroll, CeremonyError::NotSupported) => Self::Unsupported,
            (Ceremony::Enroll, CeremonyError::InvalidState) => Self::AlreadyEnrolled,
            (_, CeremonyError::Security) => Self::Security,
            (c, CeremonyError::NotAllowed) => Self::NotAllowed(c),
            (c, CeremonyError::Abort) => Self::Aborted(c),
            (c, _) => Self::Failed(c),
        }
    }

    /// Whether re-invoking the same operation could ever succeed on this page.
    ///
    /// Hosts hide the enroll/verify controls when this is false.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unsupported | Self::InsecureContext)
    }
}

/// Error kinds reported by a platform credential ceremony.
///
/// Mirrors the DOMException names browsers reject `navigator.credentials`
/// promises with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    #[error("NotSupportedError")]
    NotSupported,

    #[error("SecurityError")]
    Security,

    #[error("NotAllowedError")]
    NotAllowed,

    #[error("AbortError")]
    Abort,

    #[error("InvalidStateError")]
    InvalidState,

    #[error("{name}: {message}")]
    Other { name: String, message: String },
}

impl CeremonyError {
    /// Classify a DOMException by name.
    pub fn from_dom_name(name: &str, message: &str) -> Self {
        match name {
            "NotSupportedError" => Self::NotSupported,
            "SecurityError" => Self::Security,
            "NotAllowedError" => Self::NotAllowed,
            "AbortError" => Self::Abort,
            "InvalidStateError" => Self::InvalidState,
            _ => Self::Other {
                name: name.to_string(),
                message: message.to_string(),
            },
        }
    }
}

/// Key-value store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("corrupt entry {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Camera acquisition errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device found")]
    NotFound,

    #[error("camera stream ended")]
    Ended,

    #[error("camera error: {0}")]
    Other(String),
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid page location: {0}")]
    InvalidLocation(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Sign-in errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0} is not an authorized e-mail")]
    NotAuthorized(String),

    #[error("Invalid roster: {0}")]
    InvalidRoster(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, FlowError>;
