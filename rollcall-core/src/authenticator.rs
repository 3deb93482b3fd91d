//! Platform authenticator seam.

use async_trait::async_trait;

use crate::ceremony::{
    Assertion, CredentialAssertionRequest, CredentialCreationRequest, NewCredential,
};
use crate::error::CeremonyError;

/// The platform's credential API (`navigator.credentials` in a browser).
///
/// Ceremonies suspend the caller until the user completes or dismisses an
/// out-of-process prompt. Implementations are single-threaded.
#[async_trait(?Send)]
pub trait PlatformAuthenticator {
    /// Whether a credential API exists at all on this platform.
    fn has_credential_api(&self) -> bool;

    /// Probe for a user-verifying platform authenticator.
    async fn platform_authenticator_available(&self) -> Result<bool, CeremonyError>;

    /// Run a creation ceremony.
    async fn create(
        &self,
        request: &CredentialCreationRequest,
    ) -> Result<NewCredential, CeremonyError>;

    /// Run an assertion ceremony. `Ok(None)` is a null assertion.
    async fn get(
        &self,
        request: &CredentialAssertionRequest,
    ) -> Result<Option<Assertion>, CeremonyError>;
}
