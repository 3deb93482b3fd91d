//! Single-use ceremony challenges.

use serde::{Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{FlowError, Result};

/// Challenge length in bytes (256 bits).
pub const CHALLENGE_BYTES: usize = 32;

/// A freshly generated random challenge, wiped from memory on drop.
///
/// Challenges are never persisted and never reused: each ceremony request
/// owns exactly one.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Challenge([u8; CHALLENGE_BYTES]);

impl Challenge {
    /// Draw a challenge from the operating system's CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; CHALLENGE_BYTES];
        getrandom::fill(&mut bytes).map_err(|e| FlowError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Wrap known bytes (tests and replayable fixtures).
    pub fn from_bytes(bytes: [u8; CHALLENGE_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Challenge").field(&"[REDACTED]").finish()
    }
}

impl Serialize for Challenge {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::ceremony::base64url(&self.0))
    }
}
