//! Identity-verification flow
//!
//! A single-threaded state machine that enrolls and verifies a platform
//! credential, with a simulated camera fallback:
//!
//! ```text
//! Idle ─┬─ enroll() ──────────► Enrolling ─┬─► Success ─(pause)─► Idle
//!       │                                  └─► Idle (error notice)
//!       ├─ verify() ──────────► Verifying ─┬─► Success ─(pause)─► Idle + on_success
//!       │                                  └─► Failed ──(pause)─► Idle
//!       └─ use_camera_fallback() ► Camera ─┬─ confirm_face() ► Verifying ► ...
//!                                          └─ go_back() ► Idle
//! close(): any state ► Idle + on_dismiss
//! ```
//!
//! Each opened session ends with exactly one of `on_success` or `on_dismiss`.
//! `close()` advances the session epoch: pauses and late platform results
//! belonging to an older epoch never touch the state again.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::authenticator::PlatformAuthenticator;
use crate::camera::{Camera, StreamSlot};
use crate::capability::{Capability, PageContext};
use crate::ceremony::CredentialCreationRequest;
use crate::challenge::Challenge;
use crate::config::FlowConfig;
use crate::enrollment::EnrollmentRecord;
use crate::error::{Ceremony, FlowError, Result};
use crate::store::KeyValueStore;
use crate::strategy::{
    CameraStrategy, CredentialStrategy, StrategyKind, Verdict, VerificationStrategy,
};
use crate::timer::{Pause, Timer};

/// Where the flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowState {
    Idle,
    Enrolling,
    Verifying,
    Camera,
    Success,
    Failed,
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Enrolling => "enrolling",
            Self::Verifying => "verifying",
            Self::Camera => "camera",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Caller contract: the flow owns no routing or page state, it only reports.
pub trait FlowObserver {
    fn on_state_change(&self, _from: FlowState, _to: FlowState) {}

    fn on_success(&self, _verdict: &Verdict) {}

    fn on_dismiss(&self) {}
}

struct NoopObserver;

impl FlowObserver for NoopObserver {}

/// Observer built from two closures.
pub struct CallbackObserver {
    on_success: Box<dyn Fn(&Verdict)>,
    on_dismiss: Box<dyn Fn()>,
}

impl CallbackObserver {
    pub fn new(on_success: impl Fn(&Verdict) + 'static, on_dismiss: impl Fn() + 'static) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_dismiss: Box::new(on_dismiss),
        }
    }
}

impl FlowObserver for CallbackObserver {
    fn on_success(&self, verdict: &Verdict) {
        (self.on_success)(verdict)
    }

    fn on_dismiss(&self) {
        (self.on_dismiss)()
    }
}

/// Marks a platform call as in flight for as long as it lives.
struct InFlight<'a>(&'a Cell<bool>);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Builder for [`IdentityVerificationFlow`].
pub struct FlowBuilder {
    authenticator: Rc<dyn PlatformAuthenticator>,
    camera: Rc<dyn Camera>,
    store: Rc<dyn KeyValueStore>,
    timer: Rc<dyn Timer>,
    observer: Rc<dyn FlowObserver>,
    context: PageContext,
    config: FlowConfig,
}

impl FlowBuilder {
    pub fn new(
        authenticator: Rc<dyn PlatformAuthenticator>,
        camera: Rc<dyn Camera>,
        store: Rc<dyn KeyValueStore>,
        timer: Rc<dyn Timer>,
    ) -> Self {
        Self {
            authenticator,
            camera,
            store,
            timer,
            observer: Rc::new(NoopObserver),
            context: PageContext::localhost(),
            config: FlowConfig::default(),
        }
    }

    pub fn context(mut self, context: PageContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Rc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> IdentityVerificationFlow {
        IdentityVerificationFlow {
            authenticator: self.authenticator,
            camera: self.camera,
            store: self.store,
            timer: self.timer,
            observer: self.observer,
            context: self.context,
            config: self.config,
            state: Cell::new(FlowState::Idle),
            in_flight: Cell::new(false),
            epoch: Cell::new(0),
            strategy: RefCell::new(None),
            stream: Rc::new(StreamSlot::new()),
            notice: RefCell::new(None),
        }
    }
}

/// Enrollment/verification state machine over injected platform services.
pub struct IdentityVerificationFlow {
    authenticator: Rc<dyn PlatformAuthenticator>,
    camera: Rc<dyn Camera>,
    store: Rc<dyn KeyValueStore>,
    timer: Rc<dyn Timer>,
    observer: Rc<dyn FlowObserver>,
    context: PageContext,
    config: FlowConfig,
    state: Cell<FlowState>,
    in_flight: Cell<bool>,
    epoch: Cell<u64>,
    strategy: RefCell<Option<Rc<dyn VerificationStrategy>>>,
    stream: Rc<StreamSlot>,
    notice: RefCell<Option<String>>,
}

impl IdentityVerificationFlow {
    pub fn builder(
        authenticator: Rc<dyn PlatformAuthenticator>,
        camera: Rc<dyn Camera>,
        store: Rc<dyn KeyValueStore>,
        timer: Rc<dyn Timer>,
    ) -> FlowBuilder {
        FlowBuilder::new(authenticator, camera, store, timer)
    }

    pub fn state(&self) -> FlowState {
        self.state.get()
    }

    /// Message currently shown to the user, if any.
    pub fn notice(&self) -> Option<String> {
        self.notice.borrow().clone()
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn enrollment(&self) -> Result<Option<EnrollmentRecord>> {
        Ok(EnrollmentRecord::load(&*self.store)?)
    }

    /// Whether a complete enrollment record exists. Storage errors read as false.
    pub fn is_enrolled(&self) -> bool {
        matches!(self.enrollment(), Ok(Some(_)))
    }

    pub fn has_open_stream(&self) -> bool {
        self.stream.is_occupied()
    }

    pub fn active_strategy(&self) -> Option<StrategyKind> {
        self.strategy.borrow().as_ref().map(|s| s.kind())
    }

    /// Whether a platform credential ceremony can be offered on this page.
    ///
    /// Never fails: a missing API or a throwing probe reads as `Unsupported`.
    #[instrument(level = "debug", skip(self))]
    pub async fn check_capability(&self) -> Capability {
        if let Some(blocked) = self.environment_block() {
            return blocked;
        }
        match self.authenticator.platform_authenticator_available().await {
            Ok(true) => Capability::Available,
            Ok(false) => {
                debug!("No user-verifying platform authenticator");
                Capability::Unsupported
            }
            Err(e) => {
                warn!(error = %e, "Platform authenticator probe failed");
                Capability::Unsupported
            }
        }
    }

    /// Create a platform credential and persist its id.
    #[instrument(level = "info", skip(self))]
    pub async fn enroll(&self) -> Result<EnrollmentRecord> {
        self.ensure_ready()?;
        if let Some(err) = self.environment_block().and_then(Capability::as_error) {
            return Err(self.reject(err));
        }
        if self.enrollment().map_err(|e| self.reject(e))?.is_some() {
            return Err(self.reject(FlowError::AlreadyEnrolled));
        }
        let epoch = self.epoch.get();

        let created = {
            let _in_flight = InFlight::acquire(&self.in_flight);

            match self.authenticator.platform_authenticator_available().await {
                Ok(true) => {}
                Ok(false) => return Err(self.reject(FlowError::SensorUnavailable)),
                Err(e) => {
                    warn!(error = %e, "Unable to detect fingerprint sensor");
                    return Err(self.reject(FlowError::SensorUnavailable));
                }
            }
            if !self.is_current(epoch) {
                return Err(FlowError::Cancelled);
            }

            let request = CredentialCreationRequest::for_enrollment(
                Challenge::generate().map_err(|e| self.reject(e))?,
                &self.context,
                &self.config,
                uuid::Uuid::new_v4().as_bytes().to_vec(),
            );
            self.clear_notice();
            self.set_state(FlowState::Enrolling);
            self.authenticator.create(&request).await
        };

        let record = match created {
            Ok(credential) => EnrollmentRecord::from_raw_id(&credential.raw_id)
                .ok_or(FlowError::Failed(Ceremony::Enroll)),
            Err(e) => {
                warn!(error = %e, "Enrollment ceremony failed");
                Err(FlowError::from_ceremony(Ceremony::Enroll, e))
            }
        };
        let persisted = record.and_then(|record| {
            record.persist(&*self.store)?;
            Ok(record)
        });
        let record = match persisted {
            Ok(record) => record,
            Err(err) => {
                if self.is_current(epoch) {
                    self.set_notice(&err);
                    self.set_state(FlowState::Idle);
                }
                return Err(err);
            }
        };
        info!(credential_id = %record.credential_id, "Enrollment completed");

        // The credential exists on the authenticator even if the session was
        // closed meanwhile, so the record stays; only the display is skipped.
        if self.is_current(epoch) {
            self.set_state(FlowState::Success);
            self.pace(Pause::EnrollmentSuccess).await;
            if self.is_current(epoch) {
                self.set_state(FlowState::Idle);
            }
        }
        Ok(record)
    }

    /// Verify the user against the enrolled credential.
    #[instrument(level = "info", skip(self))]
    pub async fn verify(&self) -> Result<Verdict> {
        self.ensure_ready()?;
        let record = self
            .enrollment()
            .map_err(|e| self.reject(e))?
            .ok_or_else(|| self.reject(FlowError::NoEnrollment))?;
        let epoch = self.epoch.get();

        let capability = {
            let _in_flight = InFlight::acquire(&self.in_flight);
            self.check_capability().await
        };
        if !self.is_current(epoch) {
            return Err(FlowError::Cancelled);
        }
        if let Some(err) = capability.as_error() {
            return Err(self.reject(err));
        }

        let strategy: Rc<dyn VerificationStrategy> = Rc::new(CredentialStrategy::new(
            self.authenticator.clone(),
            record,
            self.context.clone(),
            self.config.clone(),
        ));
        self.install_strategy(strategy.clone());
        self.clear_notice();
        self.set_state(FlowState::Verifying);

        let outcome = {
            let _in_flight = InFlight::acquire(&self.in_flight);
            match strategy.begin().await {
                Ok(()) => strategy.result().await,
                Err(e) => Err(e),
            }
        };
        self.conclude(epoch, outcome, Pause::VerificationSuccess).await
    }

    /// Switch to the camera strategy and open the preview stream.
    #[instrument(level = "info", skip(self))]
    pub async fn use_camera_fallback(&self) -> Result<()> {
        if self.stream.is_occupied() {
            return Err(FlowError::CameraBusy);
        }
        self.ensure_ready()?;
        let epoch = self.epoch.get();

        let strategy: Rc<dyn VerificationStrategy> = Rc::new(CameraStrategy::new(
            self.camera.clone(),
            self.stream.clone(),
            self.timer.clone(),
            self.config.clone(),
        ));
        let started = {
            let _in_flight = InFlight::acquire(&self.in_flight);
            strategy.begin().await
        };

        if !self.is_current(epoch) {
            strategy.cancel();
            return Err(FlowError::Cancelled);
        }
        if let Err(err) = started {
            warn!(error = %err, "Camera fallback unavailable");
            return Err(self.reject(err));
        }

        self.install_strategy(strategy);
        self.clear_notice();
        self.set_state(FlowState::Camera);
        info!("Camera preview active");
        Ok(())
    }

    /// Run the simulated face check from the camera preview.
    #[instrument(level = "info", skip(self))]
    pub async fn confirm_face(&self) -> Result<Verdict> {
        let state = self.state.get();
        let strategy = self.strategy.borrow().clone();
        let strategy = match strategy {
            Some(s) if state == FlowState::Camera && s.kind() == StrategyKind::Camera => s,
            _ => return Err(FlowError::Busy(state)),
        };
        let epoch = self.epoch.get();

        self.set_state(FlowState::Verifying);
        let outcome = strategy.result().await;
        self.conclude(epoch, outcome, Pause::FaceSuccess).await
    }

    /// Leave the camera preview for the fingerprint path.
    pub fn go_back(&self) -> Result<()> {
        let state = self.state.get();
        if state != FlowState::Camera {
            return Err(FlowError::Busy(state));
        }
        self.finish_strategy();
        self.stream.release();
        self.set_state(FlowState::Idle);
        Ok(())
    }

    /// Forget the enrolled credential. Idempotent.
    #[instrument(level = "info", skip(self))]
    pub fn reset_enrollment(&self) -> Result<()> {
        EnrollmentRecord::clear(&*self.store)?;
        self.clear_notice();
        info!("Enrollment reset");
        Ok(())
    }

    /// Dismiss the flow from any state.
    ///
    /// Releases the camera synchronously, cancels every pending pause and
    /// discards late ceremony results.
    pub fn close(&self) {
        self.epoch.set(self.epoch.get().wrapping_add(1));
        self.finish_strategy();
        self.stream.release();
        self.clear_notice();
        self.set_state(FlowState::Idle);
        info!("Verification dismissed");
        self.observer.on_dismiss();
    }

    async fn conclude(
        &self,
        epoch: u64,
        outcome: Result<Verdict>,
        success_pause: Pause,
    ) -> Result<Verdict> {
        if !self.is_current(epoch) {
            debug!("Session closed before the outcome arrived");
            return Err(FlowError::Cancelled);
        }
        // The strategy is spent either way; release what it holds before the
        // terminal state is announced.
        self.finish_strategy();

        match outcome {
            Ok(verdict) => {
                self.set_state(FlowState::Success);
                self.pace(success_pause).await;
                if !self.is_current(epoch) {
                    return Err(FlowError::Cancelled);
                }
                self.set_state(FlowState::Idle);
                info!(
                    strategy = ?verdict.strategy,
                    simulated = verdict.simulated,
                    "Identity verified"
                );
                self.observer.on_success(&verdict);
                Ok(verdict)
            }
            Err(err) => {
                warn!(error = %err, "Verification failed");
                self.set_notice(&err);
                self.set_state(FlowState::Failed);
                self.pace(Pause::FailureNotice).await;
                if self.is_current(epoch) {
                    self.clear_notice();
                    self.set_state(FlowState::Idle);
                }
                Err(err)
            }
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        let state = self.state.get();
        if self.in_flight.get() || state != FlowState::Idle {
            return Err(FlowError::Busy(state));
        }
        Ok(())
    }

    fn environment_block(&self) -> Option<Capability> {
        if self.context.is_insecure_mobile() {
            Some(Capability::InsecureContext)
        } else if !self.authenticator.has_credential_api() {
            Some(Capability::Unsupported)
        } else {
            None
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.get() == epoch
    }

    async fn pace(&self, pause: Pause) {
        let delay = self.config.timings.duration(pause);
        self.timer.pause(pause, delay).await;
    }

    fn install_strategy(&self, strategy: Rc<dyn VerificationStrategy>) {
        let previous = self.strategy.borrow_mut().replace(strategy);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn finish_strategy(&self) {
        let taken = self.strategy.borrow_mut().take();
        if let Some(strategy) = taken {
            strategy.cancel();
        }
    }

    fn set_state(&self, next: FlowState) {
        let previous = self.state.replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "State changed");
            self.observer.on_state_change(previous, next);
        }
    }

    /// Record a pre-ceremony rejection as the visible notice.
    fn reject(&self, err: impl Into<FlowError>) -> FlowError {
        let err = err.into();
        self.set_notice(&err);
        err
    }

    fn set_notice(&self, err: &FlowError) {
        *self.notice.borrow_mut() = Some(err.to_string());
    }

    fn clear_notice(&self) {
        self.notice.borrow_mut().take();
    }
}

impl Drop for IdentityVerificationFlow {
    fn drop(&mut self) {
        self.finish_strategy();
        if self.stream.release() {
            debug!("Released camera stream on teardown");
        }
    }
}

impl std::fmt::Debug for IdentityVerificationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerificationFlow")
            .field("state", &self.state.get())
            .field("context", &self.context)
            .field("in_flight", &self.in_flight.get())
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ceremony::NewCredential;
    use crate::error::CeremonyError;
    use crate::mock::{EventLog, MockAuthenticator, MockCamera, RecordingObserver, RecordingTimer};
    use crate::store::MemoryStore;

    struct Harness {
        flow: IdentityVerificationFlow,
        auth: Rc<MockAuthenticator>,
        store: Rc<MemoryStore>,
        timer: Rc<RecordingTimer>,
    }

    fn harness(auth: MockAuthenticator) -> Harness {
        let log = EventLog::default();
        let auth = Rc::new(auth);
        let store = Rc::new(MemoryStore::new());
        let timer = Rc::new(RecordingTimer::new(log.clone()));
        let flow = IdentityVerificationFlow::builder(
            auth.clone(),
            Rc::new(MockCamera::new(log.clone())),
            store.clone(),
            timer.clone(),
        )
        .observer(Rc::new(RecordingObserver::new(log)))
        .build();
        Harness {
            flow,
            auth,
            store,
            timer,
        }
    }

    #[tokio::test]
    async fn test_capability_probe_failure_is_unsupported() {
        let h = harness(MockAuthenticator::failing_probe());
        assert_eq!(h.flow.check_capability().await, Capability::Unsupported);

        let h = harness(MockAuthenticator::available());
        assert_eq!(h.flow.check_capability().await, Capability::Available);
    }

    #[tokio::test]
    async fn test_enroll_without_sensor() {
        let h = harness(MockAuthenticator::without_sensor());
        let err = h.flow.enroll().await.unwrap_err();

        assert!(matches!(err, FlowError::SensorUnavailable));
        assert_eq!(
            h.flow.notice().as_deref(),
            Some("Device fingerprint sensor not available")
        );
        assert_eq!(h.auth.create_calls(), 0);
        assert_eq!(h.flow.state(), FlowState::Idle);
    }

    #[tokio::test]
    async fn test_enroll_pauses_then_idles() {
        let h = harness(MockAuthenticator::available().on_create(Ok(NewCredential {
            raw_id: vec![1, 2, 3],
        })));

        let record = h.flow.enroll().await.unwrap();
        assert_eq!(record.credential_id, "010203");
        assert_eq!(h.timer.pauses(), vec![Pause::EnrollmentSuccess]);
        assert_eq!(h.flow.state(), FlowState::Idle);
        assert!(h.flow.is_enrolled());
    }

    #[tokio::test]
    async fn test_enroll_refused_while_enrolled() {
        let h = harness(MockAuthenticator::available().on_create(Ok(NewCredential {
            raw_id: vec![9],
        })));
        h.flow.enroll().await.unwrap();

        assert!(matches!(
            h.flow.enroll().await,
            Err(FlowError::AlreadyEnrolled)
        ));
        assert_eq!(h.auth.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_state_maps_to_already_enrolled() {
        let h = harness(
            MockAuthenticator::available().on_create(Err(CeremonyError::InvalidState)),
        );
        let err = h.flow.enroll().await.unwrap_err();

        assert!(matches!(err, FlowError::AlreadyEnrolled));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_credential_id_is_a_failure() {
        let h = harness(MockAuthenticator::available().on_create(Ok(NewCredential {
            raw_id: vec![],
        })));

        assert!(matches!(
            h.flow.enroll().await,
            Err(FlowError::Failed(Ceremony::Enroll))
        ));
        assert!(!h.flow.is_enrolled());
    }

    #[tokio::test]
    async fn test_insecure_mobile_blocks_before_ceremony() {
        let log = EventLog::default();
        let auth = Rc::new(MockAuthenticator::available());
        let flow = IdentityVerificationFlow::builder(
            auth.clone(),
            Rc::new(MockCamera::new(log.clone())),
            Rc::new(MemoryStore::new()),
            Rc::new(RecordingTimer::new(log)),
        )
        .context(PageContext {
            hostname: "10.0.0.5".into(),
            secure: false,
            mobile: true,
        })
        .build();

        assert_eq!(flow.check_capability().await, Capability::InsecureContext);
        let err = flow.enroll().await.unwrap_err();
        assert!(matches!(err, FlowError::InsecureContext));
        assert!(!err.is_retryable());
        assert_eq!(auth.ceremonies(), 0);
    }

    #[tokio::test]
    async fn test_go_back_requires_camera() {
        let h = harness(MockAuthenticator::available());
        assert!(matches!(
            h.flow.go_back(),
            Err(FlowError::Busy(FlowState::Idle))
        ));

        h.flow.use_camera_fallback().await.unwrap();
        assert_eq!(h.flow.active_strategy(), Some(StrategyKind::Camera));
        h.flow.go_back().unwrap();
        assert!(!h.flow.has_open_stream());
        assert_eq!(h.flow.active_strategy(), None);
    }

    #[tokio::test]
    async fn test_confirm_face_outside_camera_is_rejected() {
        let h = harness(MockAuthenticator::available());
        assert!(matches!(
            h.flow.confirm_face().await,
            Err(FlowError::Busy(FlowState::Idle))
        ));
    }

    #[tokio::test]
    async fn test_reset_clears_notice() {
        let h = harness(MockAuthenticator::available());
        assert!(h.flow.verify().await.is_err());
        assert!(h.flow.notice().is_some());

        h.flow.reset_enrollment().unwrap();
        assert!(h.flow.notice().is_none());
    }
}
