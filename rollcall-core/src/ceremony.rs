//! Credential ceremony request and response types.
//!
//! Requests serialize to the camelCase JSON shape of the W3C
//! `PublicKeyCredentialCreationOptions` / `PublicKeyCredentialRequestOptions`
//! dictionaries, with binary fields encoded as base64url.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Serialize, Serializer};

use crate::capability::PageContext;
use crate::challenge::Challenge;
use crate::config::FlowConfig;

pub(crate) fn base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn serialize_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64url(bytes))
}

/// COSE algorithm identifiers accepted for new credentials, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    /// ECDSA with P-256 and SHA-256
    Es256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
}

impl CoseAlgorithm {
    pub fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Rs256 => -257,
        }
    }
}

impl Serialize for CoseAlgorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKey {
    Discouraged,
    Preferred,
    Required,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationPreference {
    None,
    Indirect,
    Direct,
}

/// Transports hinted for the enrolled credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Internal,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    #[serde(serialize_with = "serialize_bytes")]
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CredentialParameter {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub alg: CoseAlgorithm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub authenticator_attachment: AuthenticatorAttachment,
    pub user_verification: UserVerification,
    pub require_resident_key: bool,
    pub resident_key: ResidentKey,
}

/// Options for `navigator.credentials.create({ publicKey })`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCreationRequest {
    pub challenge: Challenge,
    pub rp: RelyingParty,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<CredentialParameter>,
    pub authenticator_selection: AuthenticatorSelection,
    #[serde(rename = "timeout")]
    pub timeout_ms: u32,
    pub attestation: AttestationPreference,
}

impl CredentialCreationRequest {
    /// Enrollment request scoped to the current origin.
    ///
    /// Platform authenticator only, user verification required, no resident
    /// key, no attestation.
    pub fn for_enrollment(
        challenge: Challenge,
        context: &PageContext,
        config: &FlowConfig,
        user_handle: Vec<u8>,
    ) -> Self {
        Self {
            challenge,
            rp: RelyingParty {
                id: context.rp_id(),
                name: config.rp_name.clone(),
            },
            user: UserEntity {
                id: user_handle,
                name: config.user_name.clone(),
                display_name: config.user_display_name.clone(),
            },
            pub_key_cred_params: [CoseAlgorithm::Es256, CoseAlgorithm::Rs256]
                .into_iter()
                .map(|alg| CredentialParameter {
                    kind: "public-key",
                    alg,
                })
                .collect(),
            authenticator_selection: AuthenticatorSelection {
                authenticator_attachment: AuthenticatorAttachment::Platform,
                user_verification: UserVerification::Required,
                require_resident_key: false,
                resident_key: ResidentKey::Discouraged,
            },
            timeout_ms: config.ceremony_timeout_ms,
            attestation: AttestationPreference::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(serialize_with = "serialize_bytes")]
    pub id: Vec<u8>,
    pub transports: Vec<Transport>,
}

/// Options for `navigator.credentials.get({ publicKey })`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialAssertionRequest {
    pub challenge: Challenge,
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: UserVerification,
    #[serde(rename = "timeout")]
    pub timeout_ms: u32,
}

impl CredentialAssertionRequest {
    /// Assertion request restricted to the single enrolled credential.
    pub fn for_credential(
        challenge: Challenge,
        context: &PageContext,
        config: &FlowConfig,
        credential_id: Vec<u8>,
    ) -> Self {
        Self {
            challenge,
            rp_id: context.rp_id(),
            allow_credentials: vec![CredentialDescriptor {
                kind: "public-key",
                id: credential_id,
                transports: vec![Transport::Internal, Transport::Hybrid],
            }],
            user_verification: UserVerification::Required,
            timeout_ms: config.ceremony_timeout_ms,
        }
    }
}

/// A credential returned by a successful creation ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub raw_id: Vec<u8>,
}

/// Proof returned by a successful assertion ceremony.
///
/// Signature verification is out of scope for the flow; only the presence of
/// an assertion for the allowed credential matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub raw_id: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::CHALLENGE_BYTES;

    fn challenge() -> Challenge {
        Challenge::from_bytes([1u8; CHALLENGE_BYTES])
    }

    #[test]
    fn test_creation_request_shape() {
        let ctx = PageContext::localhost();
        let config = FlowConfig::default();
        let request =
            CredentialCreationRequest::for_enrollment(challenge(), &ctx, &config, b"user-1".to_vec());

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["rp"]["id"], "localhost");
        assert_eq!(json["pubKeyCredParams"][0]["alg"], -7);
        assert_eq!(json["pubKeyCredParams"][1]["alg"], -257);
        assert_eq!(json["pubKeyCredParams"][0]["type"], "public-key");
        assert_eq!(
            json["authenticatorSelection"]["authenticatorAttachment"],
            "platform"
        );
        assert_eq!(json["authenticatorSelection"]["userVerification"], "required");
        assert_eq!(json["authenticatorSelection"]["residentKey"], "discouraged");
        assert_eq!(json["authenticatorSelection"]["requireResidentKey"], false);
        assert_eq!(json["timeout"], 60000);
        assert_eq!(json["attestation"], "none");
        assert_eq!(json["user"]["id"], base64url(b"user-1"));
    }

    #[test]
    fn test_assertion_request_allows_only_enrolled_credential() {
        let ctx = PageContext {
            hostname: "attendance.example.edu".into(),
            secure: true,
            mobile: true,
        };
        let request = CredentialAssertionRequest::for_credential(
            challenge(),
            &ctx,
            &FlowConfig::default(),
            vec![0xab, 0x12],
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["rpId"], "attendance.example.edu");
        assert_eq!(json["allowCredentials"].as_array().unwrap().len(), 1);
        assert_eq!(json["allowCredentials"][0]["id"], base64url(&[0xab, 0x12]));
        assert_eq!(
            json["allowCredentials"][0]["transports"],
            serde_json::json!(["internal", "hybrid"])
        );
        assert_eq!(json["userVerification"], "required");
    }
}
