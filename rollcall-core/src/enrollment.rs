//! Persisted enrollment record.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Store key holding `"true"` while a credential is enrolled.
pub const ENROLLED_KEY: &str = "fingerprintEnrolled";
/// Store key holding the hex-encoded raw credential id.
pub const CREDENTIAL_ID_KEY: &str = "fingerprintCredentialId";

/// The single enrolled platform credential for this origin.
///
/// Only constructed for a complete record: `enrolled` is true and
/// `credential_id` is non-empty, valid hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub credential_id: String,
    pub enrolled: bool,
}

impl EnrollmentRecord {
    /// Record for a freshly created credential.
    ///
    /// Returns `None` for an empty raw id.
    pub fn from_raw_id(raw_id: &[u8]) -> Option<Self> {
        if raw_id.is_empty() {
            return None;
        }
        Some(Self {
            credential_id: hex::encode(raw_id),
            enrolled: true,
        })
    }

    /// Load the record. Incomplete or malformed entries read as not enrolled.
    pub fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, StoreError> {
        let flag = store.get(ENROLLED_KEY)?;
        let credential_id = store.get(CREDENTIAL_ID_KEY)?;

        match (flag.as_deref(), credential_id) {
            (Some("true"), Some(id)) if !id.is_empty() => {
                if hex::decode(&id).is_err() {
                    warn!(key = CREDENTIAL_ID_KEY, "Ignoring malformed credential id");
                    return Ok(None);
                }
                Ok(Some(Self {
                    credential_id: id,
                    enrolled: true,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Persist both entries, id first so a torn write never reads as enrolled.
    pub fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(CREDENTIAL_ID_KEY, &self.credential_id)?;
        store.set(ENROLLED_KEY, "true")
    }

    /// Remove both entries. Idempotent.
    pub fn clear(store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.remove(ENROLLED_KEY)?;
        store.remove(CREDENTIAL_ID_KEY)
    }

    /// Raw credential id for the assertion allow list.
    pub fn credential_bytes(&self) -> Result<Vec<u8>, StoreError> {
        hex::decode(&self.credential_id).map_err(|e| StoreError::Corrupt {
            key: CREDENTIAL_ID_KEY.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_persist_and_load() {
        let store = MemoryStore::new();
        let record = EnrollmentRecord::from_raw_id(&[0xab, 0x12]).unwrap();
        assert_eq!(record.credential_id, "ab12");

        record.persist(&store).unwrap();
        assert_eq!(store.get(ENROLLED_KEY).unwrap().as_deref(), Some("true"));
        assert_eq!(EnrollmentRecord::load(&store).unwrap(), Some(record));
    }

    #[test]
    fn test_empty_raw_id_is_not_a_record() {
        assert!(EnrollmentRecord::from_raw_id(&[]).is_none());
    }

    #[test]
    fn test_partial_entries_read_as_not_enrolled() {
        let store = MemoryStore::new();
        store.set(ENROLLED_KEY, "true").unwrap();
        assert_eq!(EnrollmentRecord::load(&store).unwrap(), None);

        store.set(CREDENTIAL_ID_KEY, "").unwrap();
        assert_eq!(EnrollmentRecord::load(&store).unwrap(), None);

        store.set(CREDENTIAL_ID_KEY, "zz").unwrap();
        assert_eq!(EnrollmentRecord::load(&store).unwrap(), None);

        store.remove(ENROLLED_KEY).unwrap();
        store.set(CREDENTIAL_ID_KEY, "ab12").unwrap();
        assert_eq!(EnrollmentRecord::load(&store).unwrap(), None);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = MemoryStore::new();
        EnrollmentRecord::from_raw_id(b"id")
            .unwrap()
            .persist(&store)
            .unwrap();

        EnrollmentRecord::clear(&store).unwrap();
        EnrollmentRecord::clear(&store).unwrap();
        assert!(store.is_empty());
    }
}
