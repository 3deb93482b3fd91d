//! Camera acquisition and exclusive stream ownership.

use std::cell::RefCell;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::error::{CameraError, FlowError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Video constraints for `getUserMedia`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl CameraConstraints {
    /// Front-facing, video only, ideal 640x480. Consumers render it mirrored.
    pub fn selfie() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_width: 640,
            ideal_height: 480,
            audio: false,
        }
    }
}

/// A live capture handle.
pub trait CameraStream {
    /// Stop every track. Must be idempotent.
    fn stop(&mut self);

    /// Whether any track is still live.
    fn is_active(&self) -> bool;
}

/// Source of capture streams (`navigator.mediaDevices` in a browser).
#[async_trait(?Send)]
pub trait Camera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// Holds at most one open stream and stops it on release or drop.
#[derive(Default)]
pub struct StreamSlot {
    stream: RefCell<Option<Box<dyn CameraStream>>>,
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a newly acquired stream.
    ///
    /// A second stream is a precondition violation: it is stopped at once and
    /// `CameraBusy` is returned, leaving the installed stream untouched.
    pub fn install(&self, mut stream: Box<dyn CameraStream>) -> Result<(), FlowError> {
        let mut slot = self.stream.borrow_mut();
        if slot.is_some() {
            stream.stop();
            return Err(FlowError::CameraBusy);
        }
        *slot = Some(stream);
        debug!("Camera stream installed");
        Ok(())
    }

    pub fn is_occupied(&self) -> bool {
        self.stream.borrow().is_some()
    }

    /// Whether a stream is installed and still live.
    pub fn is_live(&self) -> bool {
        self.stream
            .borrow()
            .as_ref()
            .is_some_and(|stream| stream.is_active())
    }

    /// Stop and drop the installed stream, if any. Returns whether one was open.
    pub fn release(&self) -> bool {
        let taken = self.stream.borrow_mut().take();
        match taken {
            Some(mut stream) => {
                stream.stop();
                debug!("Camera stream released");
                true
            }
            None => false,
        }
    }
}

impl Drop for StreamSlot {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StreamSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSlot")
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{EventLog, MockStream};

    #[test]
    fn test_second_stream_is_rejected_and_stopped() {
        let log = EventLog::default();
        let slot = StreamSlot::new();
        let first = MockStream::new(1, log.clone());
        let second = MockStream::new(2, log.clone());
        let second_handle = second.handle();

        slot.install(Box::new(first)).unwrap();
        assert!(matches!(
            slot.install(Box::new(second)),
            Err(FlowError::CameraBusy)
        ));
        assert!(second_handle.is_stopped());
        assert!(slot.is_live());
    }

    #[test]
    fn test_release_and_drop_stop_stream() {
        let log = EventLog::default();
        let slot = StreamSlot::new();
        let stream = MockStream::new(1, log.clone());
        let handle = stream.handle();

        slot.install(Box::new(stream)).unwrap();
        assert!(slot.release());
        assert!(handle.is_stopped());
        assert!(!slot.release());

        let stream = MockStream::new(2, log.clone());
        let handle = stream.handle();
        slot.install(Box::new(stream)).unwrap();
        drop(slot);
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_selfie_constraints() {
        let c = CameraConstraints::selfie();
        assert_eq!((c.ideal_width, c.ideal_height), (640, 480));
        assert_eq!(c.facing, FacingMode::User);
        assert!(!c.audio);
    }
}
