//! Simulated platform authenticator and camera for terminal use.
//!
//! The authenticator keeps its own credential registry next to the page
//! store, the way an OS keychain outlives a browser's local storage. The
//! user's response to the prompt is decided up front (`--decline`).

use async_trait::async_trait;
use rollcall_core::ceremony::{
    Assertion, CredentialAssertionRequest, CredentialCreationRequest, NewCredential,
};
use rollcall_core::{
    Camera, CameraConstraints, CameraError, CameraStream, CeremonyError, KeyValueStore,
    PlatformAuthenticator,
};
use tracing::{debug, info, warn};

use crate::store::FileStore;

const CREDENTIAL_ID_BYTES: usize = 16;

pub struct SimulatedAuthenticator {
    keychain: FileStore,
    sensor: bool,
    decline: bool,
}

impl SimulatedAuthenticator {
    pub fn new(keychain: FileStore, sensor: bool, decline: bool) -> Self {
        Self {
            keychain,
            sensor,
            decline,
        }
    }

    fn prompt(&self, ceremony: &str) -> Result<(), CeremonyError> {
        if self.decline {
            info!(ceremony, "User dismissed the fingerprint prompt");
            return Err(CeremonyError::NotAllowed);
        }
        if !self.sensor {
            return Err(CeremonyError::NotSupported);
        }
        Ok(())
    }

    fn keychain_error(e: rollcall_core::StoreError) -> CeremonyError {
        CeremonyError::Other {
            name: "UnknownError".into(),
            message: e.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl PlatformAuthenticator for SimulatedAuthenticator {
    fn has_credential_api(&self) -> bool {
        true
    }

    async fn platform_authenticator_available(&self) -> Result<bool, CeremonyError> {
        Ok(self.sensor)
    }

    async fn create(
        &self,
        request: &CredentialCreationRequest,
    ) -> Result<NewCredential, CeremonyError> {
        self.prompt("create")?;

        let mut raw_id = [0u8; CREDENTIAL_ID_BYTES];
        getrandom::fill(&mut raw_id).map_err(|e| CeremonyError::Other {
            name: "UnknownError".into(),
            message: e.to_string(),
        })?;
        let id = hex::encode(raw_id);
        self.keychain
            .set(&id, &request.rp.id)
            .map_err(Self::keychain_error)?;

        debug!(rp_id = %request.rp.id, user = %request.user.name, "Credential created");
        Ok(NewCredential {
            raw_id: raw_id.to_vec(),
        })
    }

    async fn get(
        &self,
        request: &CredentialAssertionRequest,
    ) -> Result<Option<Assertion>, CeremonyError> {
        self.prompt("get")?;

        for descriptor in &request.allow_credentials {
            let id = hex::encode(&descriptor.id);
            let rp_id = self.keychain.get(&id).map_err(Self::keychain_error)?;
            if rp_id.as_deref() == Some(request.rp_id.as_str()) {
                let client_data = serde_json::json!({
                    "type": "webauthn.get",
                    "challenge": hex::encode(request.challenge.as_bytes()),
                    "rpId": request.rp_id,
                });
                return Ok(Some(Assertion {
                    raw_id: descriptor.id.clone(),
                    authenticator_data: Vec::new(),
                    client_data_json: client_data.to_string().into_bytes(),
                    signature: Vec::new(),
                }));
            }
        }

        // Browsers report an unknown credential like a dismissed prompt.
        warn!(rp_id = %request.rp_id, "No matching credential on this device");
        Err(CeremonyError::NotAllowed)
    }
}

/// Stand-in capture stream; there is no real video.
pub struct SimulatedStream {
    active: bool,
}

impl CameraStream for SimulatedStream {
    fn stop(&mut self) {
        if self.active {
            self.active = false;
            debug!("Camera tracks stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

pub struct SimulatedCamera {
    deny: bool,
}

impl SimulatedCamera {
    pub fn new(deny: bool) -> Self {
        Self { deny }
    }
}

#[async_trait(?Send)]
impl Camera for SimulatedCamera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        if self.deny {
            return Err(CameraError::PermissionDenied);
        }
        debug!(
            facing = ?constraints.facing,
            width = constraints.ideal_width,
            height = constraints.ideal_height,
            "Camera opened"
        );
        Ok(Box::new(SimulatedStream { active: true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{Challenge, FlowConfig, PageContext};
    use tempfile::TempDir;

    fn creation() -> CredentialCreationRequest {
        CredentialCreationRequest::for_enrollment(
            Challenge::from_bytes([1; 32]),
            &PageContext::localhost(),
            &FlowConfig::default(),
            vec![7; 16],
        )
    }

    fn assertion_for(id: Vec<u8>) -> CredentialAssertionRequest {
        CredentialAssertionRequest::for_credential(
            Challenge::from_bytes([2; 32]),
            &PageContext::localhost(),
            &FlowConfig::default(),
            id,
        )
    }

    #[tokio::test]
    async fn test_created_credential_can_be_asserted() {
        let temp = TempDir::new().unwrap();
        let auth = SimulatedAuthenticator::new(FileStore::new(temp.path().join("keys.json")), true, false);

        let credential = auth.create(&creation()).await.unwrap();
        assert_eq!(credential.raw_id.len(), CREDENTIAL_ID_BYTES);

        let assertion = auth
            .get(&assertion_for(credential.raw_id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assertion.raw_id, credential.raw_id);
    }

    #[tokio::test]
    async fn test_unknown_credential_is_not_allowed() {
        let temp = TempDir::new().unwrap();
        let auth = SimulatedAuthenticator::new(FileStore::new(temp.path().join("keys.json")), true, false);

        assert_eq!(
            auth.get(&assertion_for(vec![0xab, 0x12])).await,
            Err(CeremonyError::NotAllowed)
        );
    }

    #[tokio::test]
    async fn test_decline_dismisses_prompt() {
        let temp = TempDir::new().unwrap();
        let auth = SimulatedAuthenticator::new(FileStore::new(temp.path().join("keys.json")), true, true);

        assert_eq!(
            auth.create(&creation()).await.unwrap_err(),
            CeremonyError::NotAllowed
        );
    }

    #[tokio::test]
    async fn test_denied_camera() {
        let camera = SimulatedCamera::new(true);
        assert!(matches!(
            camera.acquire(&CameraConstraints::selfie()).await,
            Err(CameraError::PermissionDenied)
        ));

        let mut stream = SimulatedCamera::new(false)
            .acquire(&CameraConstraints::selfie())
            .await
            .unwrap();
        stream.stop();
        assert!(!stream.is_active());
    }
}
