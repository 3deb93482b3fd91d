//! Scripted platform doubles for tests and demos.
//!
//! WARNING: nothing here talks to a real authenticator or camera.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;

use crate::authenticator::PlatformAuthenticator;
use crate::camera::{Camera, CameraConstraints, CameraStream};
use crate::ceremony::{
    Assertion, CredentialAssertionRequest, CredentialCreationRequest, NewCredential,
};
use crate::error::{CameraError, CeremonyError};
use crate::flow::{FlowObserver, FlowState};
use crate::strategy::Verdict;
use crate::timer::{Pause, Timer};

/// Something observable that happened during a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StreamOpened(u32),
    StreamStopped(u32),
    StateChanged(FlowState),
    Paused(Pause),
    Success,
    Dismissed,
}

/// Shared, ordered record of [`Event`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &Event) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }
}

/// Build an assertion for `raw_id` with empty proof fields.
pub fn assertion(raw_id: &[u8]) -> Assertion {
    Assertion {
        raw_id: raw_id.to_vec(),
        authenticator_data: Vec::new(),
        client_data_json: Vec::new(),
        signature: Vec::new(),
    }
}

/// Scripted platform authenticator.
///
/// Ceremony results are consumed in order; an exhausted script behaves like
/// the user dismissing the prompt (`NotAllowedError`).
pub struct MockAuthenticator {
    credential_api: bool,
    probe: Result<bool, CeremonyError>,
    create_results: RefCell<VecDeque<Result<NewCredential, CeremonyError>>>,
    get_results: RefCell<VecDeque<Result<Option<Assertion>, CeremonyError>>>,
    create_calls: Cell<u32>,
    get_calls: Cell<u32>,
    last_allowed: RefCell<Option<Vec<u8>>>,
}

impl MockAuthenticator {
    fn with(credential_api: bool, probe: Result<bool, CeremonyError>) -> Self {
        Self {
            credential_api,
            probe,
            create_results: RefCell::new(VecDeque::new()),
            get_results: RefCell::new(VecDeque::new()),
            create_calls: Cell::new(0),
            get_calls: Cell::new(0),
            last_allowed: RefCell::new(None),
        }
    }

    /// Credential API present, platform authenticator available.
    pub fn available() -> Self {
        Self::with(true, Ok(true))
    }

    /// No credential API in this browser.
    pub fn unsupported() -> Self {
        Self::with(false, Ok(false))
    }

    /// Credential API present but no platform authenticator.
    pub fn without_sensor() -> Self {
        Self::with(true, Ok(false))
    }

    /// Credential API present, probe throws.
    pub fn failing_probe() -> Self {
        Self::with(
            true,
            Err(CeremonyError::Other {
                name: "UnknownError".into(),
                message: "probe failed".into(),
            }),
        )
    }

    pub fn on_create(self, result: Result<NewCredential, CeremonyError>) -> Self {
        self.create_results.borrow_mut().push_back(result);
        self
    }

    pub fn on_get(self, result: Result<Option<Assertion>, CeremonyError>) -> Self {
        self.get_results.borrow_mut().push_back(result);
        self
    }

    /// Queue a creation result after construction.
    pub fn push_create(&self, result: Result<NewCredential, CeremonyError>) {
        self.create_results.borrow_mut().push_back(result);
    }

    /// Queue an assertion result after construction.
    pub fn push_get(&self, result: Result<Option<Assertion>, CeremonyError>) {
        self.get_results.borrow_mut().push_back(result);
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.get()
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.get()
    }

    pub fn ceremonies(&self) -> u32 {
        self.create_calls() + self.get_calls()
    }

    /// Credential id the last assertion request allowed.
    pub fn last_allowed_credential(&self) -> Option<Vec<u8>> {
        self.last_allowed.borrow().clone()
    }
}

#[async_trait(?Send)]
impl PlatformAuthenticator for MockAuthenticator {
    fn has_credential_api(&self) -> bool {
        self.credential_api
    }

    async fn platform_authenticator_available(&self) -> Result<bool, CeremonyError> {
        self.probe.clone()
    }

    async fn create(
        &self,
        _request: &CredentialCreationRequest,
    ) -> Result<NewCredential, CeremonyError> {
        self.create_calls.set(self.create_calls.get() + 1);
        self.create_results
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(CeremonyError::NotAllowed))
    }

    async fn get(
        &self,
        request: &CredentialAssertionRequest,
    ) -> Result<Option<Assertion>, CeremonyError> {
        self.get_calls.set(self.get_calls.get() + 1);
        *self.last_allowed.borrow_mut() = request
            .allow_credentials
            .first()
            .map(|descriptor| descriptor.id.clone());
        self.get_results
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(CeremonyError::NotAllowed))
    }
}

/// Observer-side view of a [`MockStream`].
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: u32,
    active: Rc<Cell<bool>>,
    stopped: Rc<Cell<bool>>,
}

impl StreamHandle {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Simulate the device ending the track (unplugged, revoked).
    pub fn end(&self) {
        self.active.set(false);
    }
}

/// Capture stream that records when it is stopped.
pub struct MockStream {
    handle: StreamHandle,
    log: EventLog,
}

impl MockStream {
    pub fn new(id: u32, log: EventLog) -> Self {
        log.push(Event::StreamOpened(id));
        Self {
            handle: StreamHandle {
                id,
                active: Rc::new(Cell::new(true)),
                stopped: Rc::new(Cell::new(false)),
            },
            log,
        }
    }

    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }
}

impl CameraStream for MockStream {
    fn stop(&mut self) {
        if !self.handle.stopped.get() {
            self.handle.stopped.set(true);
            self.handle.active.set(false);
            self.log.push(Event::StreamStopped(self.handle.id));
        }
    }

    fn is_active(&self) -> bool {
        self.handle.active.get()
    }
}

/// Camera that hands out [`MockStream`]s, or denies access.
pub struct MockCamera {
    log: EventLog,
    denial: Option<CameraError>,
    streams: RefCell<Vec<StreamHandle>>,
    last_constraints: Cell<Option<CameraConstraints>>,
}

impl MockCamera {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            denial: None,
            streams: RefCell::new(Vec::new()),
            last_constraints: Cell::new(None),
        }
    }

    /// Camera that refuses every acquisition with `err`.
    pub fn denying(log: EventLog, err: CameraError) -> Self {
        Self {
            denial: Some(err),
            ..Self::new(log)
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.streams.borrow().len()
    }

    /// Streams handed out and not yet stopped.
    pub fn open_streams(&self) -> usize {
        self.streams
            .borrow()
            .iter()
            .filter(|s| !s.is_stopped())
            .count()
    }

    pub fn last_stream(&self) -> Option<StreamHandle> {
        self.streams.borrow().last().cloned()
    }

    pub fn last_constraints(&self) -> Option<CameraConstraints> {
        self.last_constraints.get()
    }
}

#[async_trait(?Send)]
impl Camera for MockCamera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        self.last_constraints.set(Some(*constraints));
        if let Some(err) = &self.denial {
            return Err(err.clone());
        }
        let id = self.streams.borrow().len() as u32 + 1;
        let stream = MockStream::new(id, self.log.clone());
        self.streams.borrow_mut().push(stream.handle());
        Ok(Box::new(stream))
    }
}

/// Timer that records each pause and returns immediately.
pub struct RecordingTimer {
    log: EventLog,
    pauses: RefCell<Vec<Pause>>,
}

impl RecordingTimer {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            pauses: RefCell::new(Vec::new()),
        }
    }

    pub fn pauses(&self) -> Vec<Pause> {
        self.pauses.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Timer for RecordingTimer {
    async fn pause(&self, pause: Pause, _duration: Duration) {
        self.pauses.borrow_mut().push(pause);
        self.log.push(Event::Paused(pause));
    }
}

/// Observer that appends every callback to an [`EventLog`].
pub struct RecordingObserver {
    log: EventLog,
    verdicts: RefCell<Vec<Verdict>>,
}

impl RecordingObserver {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            verdicts: RefCell::new(Vec::new()),
        }
    }

    pub fn successes(&self) -> usize {
        self.verdicts.borrow().len()
    }

    pub fn dismissals(&self) -> usize {
        self.log.count(&Event::Dismissed)
    }

    pub fn last_verdict(&self) -> Option<Verdict> {
        self.verdicts.borrow().last().cloned()
    }
}

impl FlowObserver for RecordingObserver {
    fn on_state_change(&self, _from: FlowState, to: FlowState) {
        self.log.push(Event::StateChanged(to));
    }

    fn on_success(&self, verdict: &Verdict) {
        self.verdicts.borrow_mut().push(verdict.clone());
        self.log.push(Event::Success);
    }

    fn on_dismiss(&self) {
        self.log.push(Event::Dismissed);
    }
}
