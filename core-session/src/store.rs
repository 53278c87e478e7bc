//! Credential Persistence
//!
//! Persists the session credential pair through the host's `SecureStore`.
//!
//! The pair is serialized as one JSON record under a single storage key, so
//! the "both credentials present or neither" invariant is structural: no
//! interleaving of reads and writes can observe exactly one slot. Corrupted
//! records are deleted on read and treated as absent. Storage unavailability
//! on read is also treated as absent; the caller proceeds unauthenticated and
//! the identity service decides.

use crate::error::{Result, SessionError};
use crate::types::CredentialPair;
use bridge_traits::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key for the serialized credential record.
const CREDENTIALS_KEY: &str = "session_credentials:v1";

/// Which slot of the credential pair to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Short-lived bearer credential attached to API calls
    Access,
    /// Longer-lived credential used solely for renewal
    Renewal,
}

/// Serializable record holding both credential slots.
#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    access: String,
    renewal: String,
}

/// Persistent holder for the access/renewal credential pair.
///
/// Cheap to clone; all clones share the underlying secure store.
#[derive(Clone)]
pub struct CredentialStore {
    secure_store: Arc<dyn SecureStore>,
}

impl CredentialStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Retrieve one credential slot.
    ///
    /// Returns `None` when no pair is stored, when the record is corrupted
    /// (the record is then deleted), or when storage is unavailable.
    pub async fn get(&self, kind: CredentialKind) -> Option<String> {
        let record = self.read_record().await?;
        Some(match kind {
            CredentialKind::Access => record.access,
            CredentialKind::Renewal => record.renewal,
        })
    }

    /// Retrieve the whole pair, or `None` if absent.
    pub async fn pair(&self) -> Option<CredentialPair> {
        let record = self.read_record().await?;
        Some(CredentialPair {
            access: record.access,
            renewal: record.renewal,
        })
    }

    /// Persist a whole pair, overwriting any previous record.
    pub async fn store_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.write_record(&StoredCredentials {
            access: pair.access.clone(),
            renewal: pair.renewal.clone(),
        })
        .await?;

        debug!("Credential pair stored");
        Ok(())
    }

    /// Overwrite one slot of an existing pair.
    ///
    /// Used by the renewal path, which replaces the access credential while
    /// keeping the renewal credential. A pair is only ever created whole via
    /// [`store_pair`](Self::store_pair); updating a slot with no record
    /// present is a storage error.
    pub async fn set(&self, kind: CredentialKind, value: &str) -> Result<()> {
        let mut record = self.read_record().await.ok_or_else(|| {
            SessionError::Storage("no credential record to update".to_string())
        })?;

        match kind {
            CredentialKind::Access => record.access = value.to_string(),
            CredentialKind::Renewal => record.renewal = value.to_string(),
        }

        self.write_record(&record).await?;

        debug!(kind = ?kind, "Credential slot updated");
        Ok(())
    }

    /// Remove both credentials.
    ///
    /// A single record delete, so no reader can observe one slot cleared and
    /// the other not. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to clear credential store");
                SessionError::Storage(e.to_string())
            })?;

        debug!("Credential store cleared");
        Ok(())
    }

    async fn read_record(&self) -> Option<StoredCredentials> {
        let data = match self.secure_store.get_secret(CREDENTIALS_KEY).await {
            Ok(data) => data?,
            Err(e) => {
                // Unavailable storage reads as absent; the caller proceeds
                // unauthenticated.
                warn!(error = %e, "Secure storage unavailable, treating credentials as absent");
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Stored credential record is corrupted, deleting");
                if let Err(delete_err) = self.secure_store.delete_secret(CREDENTIALS_KEY).await {
                    warn!(error = %delete_err, "Failed to delete corrupted credential record");
                }
                None
            }
        }
    }

    async fn write_record(&self, record: &StoredCredentials) -> Result<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| SessionError::Storage(format!("credential serialization: {}", e)))?;

        self.secure_store
            .set_secret(CREDENTIALS_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to persist credential record");
                SessionError::Storage(e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    struct MockSecureStore {
        storage: Mutex<HashMap<String, Vec<u8>>>,
        fail: AtomicBool,
    }

    impl MockSecureStore {
        fn new() -> Self {
            Self {
                storage: Mutex::new(HashMap::new()),
                fail: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        fn check(&self) -> BridgeResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(BridgeError::NotAvailable("keychain locked".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl SecureStore for MockSecureStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            self.check()?;
            self.storage
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            self.check()?;
            Ok(self.storage.lock().await.get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.check()?;
            self.storage.lock().await.remove(key);
            Ok(())
        }
    }

    fn store_with_mock() -> (CredentialStore, Arc<MockSecureStore>) {
        let mock = Arc::new(MockSecureStore::new());
        (CredentialStore::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_store_and_get_pair() {
        let (store, _) = store_with_mock();
        let pair = CredentialPair::new("access-1", "renewal-1");

        store.store_pair(&pair).await.unwrap();

        assert_eq!(
            store.get(CredentialKind::Access).await.as_deref(),
            Some("access-1")
        );
        assert_eq!(
            store.get(CredentialKind::Renewal).await.as_deref(),
            Some("renewal-1")
        );
        assert_eq!(store.pair().await, Some(pair));
    }

    #[tokio::test]
    async fn test_get_absent() {
        let (store, _) = store_with_mock();
        assert!(store.get(CredentialKind::Access).await.is_none());
        assert!(store.pair().await.is_none());
    }

    #[tokio::test]
    async fn test_both_or_neither() {
        let (store, _) = store_with_mock();

        // Never exactly one slot, at any observable point.
        let both_or_neither = |access: Option<String>, renewal: Option<String>| {
            access.is_some() == renewal.is_some()
        };

        assert!(both_or_neither(
            store.get(CredentialKind::Access).await,
            store.get(CredentialKind::Renewal).await
        ));

        store
            .store_pair(&CredentialPair::new("a", "r"))
            .await
            .unwrap();
        assert!(both_or_neither(
            store.get(CredentialKind::Access).await,
            store.get(CredentialKind::Renewal).await
        ));

        store.clear().await.unwrap();
        assert!(both_or_neither(
            store.get(CredentialKind::Access).await,
            store.get(CredentialKind::Renewal).await
        ));
    }

    #[tokio::test]
    async fn test_set_access_keeps_renewal() {
        let (store, _) = store_with_mock();
        store
            .store_pair(&CredentialPair::new("access-1", "renewal-1"))
            .await
            .unwrap();

        store.set(CredentialKind::Access, "access-2").await.unwrap();

        assert_eq!(
            store.get(CredentialKind::Access).await.as_deref(),
            Some("access-2")
        );
        assert_eq!(
            store.get(CredentialKind::Renewal).await.as_deref(),
            Some("renewal-1")
        );
    }

    #[tokio::test]
    async fn test_set_without_record_fails() {
        let (store, _) = store_with_mock();
        let result = store.set(CredentialKind::Access, "access-1").await;
        assert!(matches!(result, Err(SessionError::Storage(_))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (store, _) = store_with_mock();
        store.clear().await.unwrap();

        store
            .store_pair(&CredentialPair::new("a", "r"))
            .await
            .unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(store.pair().await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_storage_reads_as_absent() {
        let (store, mock) = store_with_mock();
        store
            .store_pair(&CredentialPair::new("a", "r"))
            .await
            .unwrap();

        mock.set_failing(true);
        assert!(store.get(CredentialKind::Access).await.is_none());

        mock.set_failing(false);
        assert!(store.get(CredentialKind::Access).await.is_some());
    }

    #[tokio::test]
    async fn test_corrupted_record_deleted_and_absent() {
        let (store, mock) = store_with_mock();
        mock.set_secret(CREDENTIALS_KEY, b"not json").await.unwrap();

        assert!(store.pair().await.is_none());

        // The corrupted record was removed.
        let raw = mock.get_secret(CREDENTIALS_KEY).await.unwrap();
        assert!(raw.is_none());
    }
}
