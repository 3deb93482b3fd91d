//! Rollcall Core - identity verification for the attendance tracker
//!
//! This crate drives the "prove it's you" step of marking attendance: it
//! enrolls a device platform credential (fingerprint, face unlock, PIN),
//! verifies the user against it, and offers a simulated camera fallback.
//!
//! # Features
//!
//! - Explicit state machine ([`IdentityVerificationFlow`]) with one terminal
//!   signal per session: `on_success` or `on_dismiss`
//! - Platform services injected through traits, so the same flow runs in a
//!   browser (`rollcall-wasm`), a terminal (`rollcall-cli`) or a test
//! - Fresh 32-byte challenges per ceremony, zeroized on drop
//! - Camera stream ownership that cannot leak past `close()` or drop
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use rollcall_core::mock::{EventLog, MockAuthenticator, MockCamera, RecordingTimer};
//! use rollcall_core::{IdentityVerificationFlow, MemoryStore};
//!
//! # async fn example() -> rollcall_core::Result<()> {
//! let log = EventLog::default();
//! let flow = IdentityVerificationFlow::builder(
//!     Rc::new(MockAuthenticator::available()),
//!     Rc::new(MockCamera::new(log.clone())),
//!     Rc::new(MemoryStore::new()),
//!     Rc::new(RecordingTimer::new(log)),
//! )
//! .build();
//!
//! if !flow.check_capability().await.is_blocking() {
//!     flow.enroll().await?;
//!     let verdict = flow.verify().await?;
//!     assert!(!verdict.simulated);
//! }
//! # Ok(())
//! # }
//! ```

pub mod authenticator;
pub mod camera;
pub mod capability;
pub mod ceremony;
pub mod challenge;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod flow;
pub mod mock;
pub mod session;
pub mod store;
pub mod strategy;
pub mod timer;

pub use authenticator::PlatformAuthenticator;
pub use camera::{Camera, CameraConstraints, CameraStream, FacingMode, StreamSlot};
pub use capability::{is_mobile_user_agent, Capability, PageContext};
pub use ceremony::{
    Assertion, CredentialAssertionRequest, CredentialCreationRequest, NewCredential,
};
pub use challenge::{Challenge, CHALLENGE_BYTES};
pub use config::FlowConfig;
pub use enrollment::{EnrollmentRecord, CREDENTIAL_ID_KEY, ENROLLED_KEY};
pub use error::{
    CameraError, Ceremony, CeremonyError, ConfigError, FlowError, Result, SessionError,
    StoreError,
};
pub use flow::{CallbackObserver, FlowBuilder, FlowObserver, FlowState, IdentityVerificationFlow};
pub use session::{Role, Roster, Session, SignedInUser, USER_EMAIL_KEY};
pub use store::{KeyValueStore, MemoryStore};
pub use strategy::{StrategyKind, Verdict, VerificationStrategy};
pub use timer::{FlowTimings, Pause, Timer};

#[cfg(feature = "tokio")]
pub use timer::TokioTimer;
