//! UX pacing pauses.
//!
//! Every suspension point the flow waits on for display purposes is a named
//! [`Pause`]. A single injected [`Timer`] performs all of them, so hosts (and
//! tests) control pacing without touching the state machine. Pauses are not
//! part of the correctness contract: `close()` cancels any of them.

use std::time::Duration;

use async_trait::async_trait;

/// Named suspension points of the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pause {
    /// "Enrollment successful" display before returning to idle.
    EnrollmentSuccess,
    /// "Verification successful" display before signalling success.
    VerificationSuccess,
    /// Failure notice display before returning to idle.
    FailureNotice,
    /// Simulated face analysis on the camera path.
    FaceAnalysis,
    /// "Face ID verified" display before signalling success.
    FaceSuccess,
}

/// Durations for each [`Pause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
    pub enrollment_success: Duration,
    pub verification_success: Duration,
    pub failure_notice: Duration,
    pub face_analysis: Duration,
    pub face_success: Duration,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            enrollment_success: Duration::from_millis(2000),
            verification_success: Duration::from_millis(2000),
            failure_notice: Duration::from_millis(3000),
            face_analysis: Duration::from_millis(3000),
            face_success: Duration::from_millis(1500),
        }
    }
}

impl FlowTimings {
    /// No pacing at all (scripts and tests).
    pub fn instant() -> Self {
        Self {
            enrollment_success: Duration::ZERO,
            verification_success: Duration::ZERO,
            failure_notice: Duration::ZERO,
            face_analysis: Duration::ZERO,
            face_success: Duration::ZERO,
        }
    }

    /// Override both post-success displays.
    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.enrollment_success = delay;
        self.verification_success = delay;
        self.face_success = delay;
        self
    }

    pub fn duration(&self, pause: Pause) -> Duration {
        match pause {
            Pause::EnrollmentSuccess => self.enrollment_success,
            Pause::VerificationSuccess => self.verification_success,
            Pause::FailureNotice => self.failure_notice,
            Pause::FaceAnalysis => self.face_analysis,
            Pause::FaceSuccess => self.face_success,
        }
    }
}

/// Suspends the calling task for one pause.
#[async_trait(?Send)]
pub trait Timer {
    async fn pause(&self, pause: Pause, duration: Duration);
}

/// Timer backed by the tokio clock.
#[cfg(feature = "tokio")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

#[cfg(feature = "tokio")]
#[async_trait(?Send)]
impl Timer for TokioTimer {
    async fn pause(&self, pause: Pause, duration: Duration) {
        tracing::trace!(?pause, delay_ms = duration.as_millis() as u64, "Pausing");
        tokio::time::sleep(duration).await;
    }
}
