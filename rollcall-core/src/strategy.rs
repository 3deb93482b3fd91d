//! Verification strategies.
//!
//! The flow verifies identity through one of two interchangeable strategies
//! sharing a `begin()/result()/cancel()` contract:
//!
//! - [`CredentialStrategy`]: an assertion ceremony against the enrolled
//!   platform credential.
//! - [`CameraStrategy`]: a front-facing camera preview followed by a
//!   **simulated** face check. No face matching happens; verdicts from this
//!   strategy are always flagged `simulated`.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::authenticator::PlatformAuthenticator;
use crate::camera::{Camera, CameraConstraints, StreamSlot};
use crate::capability::PageContext;
use crate::ceremony::CredentialAssertionRequest;
use crate::challenge::Challenge;
use crate::config::FlowConfig;
use crate::enrollment::EnrollmentRecord;
use crate::error::{CameraError, Ceremony, FlowError, Result};
use crate::timer::{Pause, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    PlatformCredential,
    Camera,
}

/// Outcome of a successful verification, handed to the success callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub strategy: StrategyKind,
    /// True when no real identity check took place.
    pub simulated: bool,
    /// Hex id of the credential that produced the assertion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// One way of verifying the user.
#[async_trait(?Send)]
pub trait VerificationStrategy {
    fn kind(&self) -> StrategyKind;

    /// Prepare the strategy (challenge, stream). Must precede `result()`.
    async fn begin(&self) -> Result<()>;

    /// Run the check.
    async fn result(&self) -> Result<Verdict>;

    /// Abandon the attempt and release anything `begin()` acquired.
    /// Synchronous and idempotent.
    fn cancel(&self);
}

/// Assertion ceremony against the enrolled credential.
pub struct CredentialStrategy {
    authenticator: Rc<dyn PlatformAuthenticator>,
    record: EnrollmentRecord,
    context: PageContext,
    config: FlowConfig,
    pending: RefCell<Option<CredentialAssertionRequest>>,
}

impl CredentialStrategy {
    pub fn new(
        authenticator: Rc<dyn PlatformAuthenticator>,
        record: EnrollmentRecord,
        context: PageContext,
        config: FlowConfig,
    ) -> Self {
        Self {
            authenticator,
            record,
            context,
            config,
            pending: RefCell::new(None),
        }
    }
}

#[async_trait(?Send)]
impl VerificationStrategy for CredentialStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PlatformCredential
    }

    async fn begin(&self) -> Result<()> {
        let credential_id = self.record.credential_bytes()?;
        let request = CredentialAssertionRequest::for_credential(
            Challenge::generate()?,
            &self.context,
            &self.config,
            credential_id,
        );
        *self.pending.borrow_mut() = Some(request);
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(credential_id = %self.record.credential_id))]
    async fn result(&self) -> Result<Verdict> {
        // The request (and its challenge) is dropped once the ceremony ends.
        let request = self
            .pending
            .borrow_mut()
            .take()
            .ok_or(FlowError::Failed(Ceremony::Verify))?;

        let assertion = self
            .authenticator
            .get(&request)
            .await
            .map_err(|e| FlowError::from_ceremony(Ceremony::Verify, e))?
            .ok_or(FlowError::Failed(Ceremony::Verify))?;

        info!("Assertion ceremony completed");
        Ok(Verdict {
            strategy: StrategyKind::PlatformCredential,
            simulated: false,
            credential_id: Some(hex::encode(&assertion.raw_id)),
            verified_at: Utc::now(),
        })
    }

    fn cancel(&self) {
        if self.pending.borrow_mut().take().is_some() {
            debug!("Discarded pending assertion request");
        }
    }
}

/// Camera preview with a simulated face check.
pub struct CameraStrategy {
    camera: Rc<dyn Camera>,
    slot: Rc<StreamSlot>,
    timer: Rc<dyn Timer>,
    config: FlowConfig,
}

impl CameraStrategy {
    pub fn new(
        camera: Rc<dyn Camera>,
        slot: Rc<StreamSlot>,
        timer: Rc<dyn Timer>,
        config: FlowConfig,
    ) -> Self {
        Self {
            camera,
            slot,
            timer,
            config,
        }
    }
}

#[async_trait(?Send)]
impl VerificationStrategy for CameraStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Camera
    }

    async fn begin(&self) -> Result<()> {
        if self.slot.is_occupied() {
            return Err(FlowError::CameraBusy);
        }
        let stream = self
            .camera
            .acquire(&CameraConstraints::selfie())
            .await
            .map_err(FlowError::CameraUnavailable)?;
        self.slot.install(stream)
    }

    async fn result(&self) -> Result<Verdict> {
        if !self.slot.is_live() {
            return Err(FlowError::CameraUnavailable(CameraError::Ended));
        }

        let delay = self.config.timings.duration(Pause::FaceAnalysis);
        self.timer.pause(Pause::FaceAnalysis, delay).await;

        if !self.slot.is_live() {
            return Err(FlowError::CameraUnavailable(CameraError::Ended));
        }

        info!(simulated = true, "Face check completed");
        Ok(Verdict {
            strategy: StrategyKind::Camera,
            simulated: true,
            credential_id: None,
            verified_at: Utc::now(),
        })
    }

    fn cancel(&self) {
        self.slot.release();
    }
}
