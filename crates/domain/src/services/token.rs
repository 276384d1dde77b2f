//! Token provider: the single source of truth for "is this session usable
//! right now".
//!
//! Returns a cached credential while it is still valid, otherwise refreshes
//! through the identity backend and overwrites the cache. A failed refresh
//! evicts the cache so no caller can fall back to a stale credential; the
//! provider never retries on its own.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Credential, Session};

/// Identity backend collaborator that issues fresh credentials.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Issues a fresh credential for the session. `existing` carries the
    /// previous credential when one is cached, for refresh-token flows.
    async fn refresh_credential(
        &self,
        session: &Session,
        existing: Option<&Credential>,
    ) -> Result<Credential, AuthError>;
}

/// Caches one credential per session user and refreshes on demand.
pub struct TokenProvider {
    backend: Arc<dyn IdentityBackend>,
    cache: RwLock<HashMap<Uuid, Credential>>,
}

impl TokenProvider {
    pub fn new(backend: Arc<dyn IdentityBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a usable credential for the session, refreshing if needed.
    ///
    /// `None` means no active session: fails with `NotSignedIn` before
    /// touching the backend.
    pub async fn valid_credential(
        &self,
        session: Option<&Session>,
    ) -> Result<Credential, AuthError> {
        let session = session.ok_or(AuthError::NotSignedIn)?;
        let now = Utc::now();

        let existing = {
            let cache = self.cache.read().unwrap();
            cache.get(&session.user_id).cloned()
        };
        if let Some(credential) = &existing {
            if credential.is_valid_at(now) {
                return Ok(credential.clone());
            }
        }

        match self
            .backend
            .refresh_credential(session, existing.as_ref())
            .await
        {
            Ok(fresh) => {
                tracing::debug!(user_id = %session.user_id, "Refreshed session credential");
                self.cache
                    .write()
                    .unwrap()
                    .insert(session.user_id, fresh.clone());
                Ok(fresh)
            }
            Err(err) => {
                // The stale credential must not be handed out after a
                // failed refresh.
                self.cache.write().unwrap().remove(&session.user_id);
                tracing::warn!(user_id = %session.user_id, error = %err, "Credential refresh failed");
                Err(err)
            }
        }
    }

    /// Drops any cached credential for the user (sign-out).
    pub fn forget(&self, user_id: Uuid) {
        self.cache.write().unwrap().remove(&user_id);
    }
}

/// Mock identity backend for development and testing.
pub struct MockIdentityBackend {
    /// Whether to simulate refresh failures.
    pub simulate_failure: bool,
    issued: std::sync::atomic::AtomicUsize,
    expiry_secs: i64,
}

impl MockIdentityBackend {
    pub fn new() -> Self {
        Self {
            simulate_failure: false,
            issued: std::sync::atomic::AtomicUsize::new(0),
            expiry_secs: 900,
        }
    }

    /// A backend whose every refresh fails.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::new()
        }
    }

    /// A backend issuing credentials that expire after `expiry_secs`.
    pub fn with_expiry(expiry_secs: i64) -> Self {
        Self {
            expiry_secs,
            ..Self::new()
        }
    }

    /// How many credentials have been issued.
    pub fn issued_count(&self) -> usize {
        self.issued.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityBackend for MockIdentityBackend {
    async fn refresh_credential(
        &self,
        session: &Session,
        _existing: Option<&Credential>,
    ) -> Result<Credential, AuthError> {
        if self.simulate_failure {
            return Err(AuthError::RefreshFailed("simulated failure".into()));
        }
        let n = self
            .issued
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Credential {
            token: format!("mock-credential-{}-{}", session.user_id, n),
            expires_at: Utc::now() + chrono::Duration::seconds(self.expiry_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_session_fails_before_backend() {
        let backend = Arc::new(MockIdentityBackend::new());
        let provider = TokenProvider::new(backend.clone());

        let result = provider.valid_credential(None).await;
        assert_eq!(result, Err(AuthError::NotSignedIn));
        assert_eq!(backend.issued_count(), 0);
    }

    #[tokio::test]
    async fn test_cached_credential_is_reused() {
        let backend = Arc::new(MockIdentityBackend::new());
        let provider = TokenProvider::new(backend.clone());
        let session = Session::new(Uuid::new_v4());

        let first = provider.valid_credential(Some(&session)).await.unwrap();
        let second = provider.valid_credential(Some(&session)).await.unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(backend.issued_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_credential_is_refreshed() {
        // Credentials expire immediately, so every call refreshes.
        let backend = Arc::new(MockIdentityBackend::with_expiry(0));
        let provider = TokenProvider::new(backend.clone());
        let session = Session::new(Uuid::new_v4());

        let first = provider.valid_credential(Some(&session)).await.unwrap();
        let second = provider.valid_credential(Some(&session)).await.unwrap();
        assert_ne!(first.token, second.token);
        assert_eq!(backend.issued_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_never_falls_back_to_stale() {
        let good = Arc::new(MockIdentityBackend::with_expiry(0));
        let provider = TokenProvider::new(good);
        let session = Session::new(Uuid::new_v4());

        // Seed the cache with a credential that is already stale.
        provider.valid_credential(Some(&session)).await.unwrap();

        // Swap in a failing backend by building a new provider over the
        // same cache semantics: simulate by a provider whose backend fails
        // and whose cache holds a stale entry.
        let failing = TokenProvider::new(Arc::new(MockIdentityBackend::failing()));
        failing.cache.write().unwrap().insert(
            session.user_id,
            Credential {
                token: "stale".into(),
                expires_at: Utc::now() - chrono::Duration::seconds(1),
            },
        );

        let result = failing.valid_credential(Some(&session)).await;
        assert!(matches!(result, Err(AuthError::RefreshFailed(_))));
        // The stale entry is gone; a later call still cannot see it.
        assert!(failing
            .cache
            .read()
            .unwrap()
            .get(&session.user_id)
            .is_none());
    }

    #[tokio::test]
    async fn test_sessions_cache_independently() {
        let backend = Arc::new(MockIdentityBackend::new());
        let provider = TokenProvider::new(backend.clone());
        let a = Session::new(Uuid::new_v4());
        let b = Session::new(Uuid::new_v4());

        let cred_a = provider.valid_credential(Some(&a)).await.unwrap();
        let cred_b = provider.valid_credential(Some(&b)).await.unwrap();
        assert_ne!(cred_a.token, cred_b.token);
        assert_eq!(backend.issued_count(), 2);
    }

    #[tokio::test]
    async fn test_forget_forces_refresh() {
        let backend = Arc::new(MockIdentityBackend::new());
        let provider = TokenProvider::new(backend.clone());
        let session = Session::new(Uuid::new_v4());

        provider.valid_credential(Some(&session)).await.unwrap();
        provider.forget(session.user_id);
        provider.valid_credential(Some(&session)).await.unwrap();
        assert_eq!(backend.issued_count(), 2);
    }
}
