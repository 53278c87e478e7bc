//! Session Lifecycle Manager
//!
//! Orchestrates login, logout, registration, and startup verification, and
//! owns the normal-path writes to the session state.
//!
//! Concurrent lifecycle operations are resolved by supersession: each
//! operation takes an epoch number at entry, performs its network work
//! lock-free, and commits its outcome only if no newer operation has started
//! since. A superseded operation discards its result and returns
//! [`SessionError::Superseded`] without touching state or storage.

use crate::error::{Result, SessionError};
use crate::hub::SessionHub;
use crate::identity::IdentityClient;
use crate::store::{CredentialKind, CredentialStore};
use crate::types::{NewAccount, SessionState, User};
use core_runtime::events::{EventBus, SessionEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

/// Drives the session lifecycle and publishes state through the shared hub.
pub struct SessionManager {
    store: CredentialStore,
    identity: Arc<IdentityClient>,
    hub: Arc<SessionHub>,
    /// Bumped at the start of every lifecycle operation.
    epoch: AtomicU64,
    /// Held only while committing an outcome; network I/O happens outside it.
    commit: Mutex<()>,
}

impl SessionManager {
    pub fn new(store: CredentialStore, identity: Arc<IdentityClient>, hub: Arc<SessionHub>) -> Self {
        Self {
            store,
            identity,
            hub,
            epoch: AtomicU64::new(0),
            commit: Mutex::new(()),
        }
    }

    /// Current session state snapshot.
    pub fn state(&self) -> SessionState {
        self.hub.state()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.hub.subscribe()
    }

    /// The core event bus.
    pub fn events(&self) -> &EventBus {
        self.hub.bus()
    }

    /// Start a lifecycle operation, superseding any in flight.
    fn begin(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Commit an outcome if this operation is still current.
    async fn commit_if_current<F>(&self, epoch: u64, apply: F) -> Result<()>
    where
        F: FnOnce(&SessionHub),
    {
        let _guard = self.commit.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Lifecycle operation superseded, discarding outcome");
            return Err(SessionError::Superseded);
        }
        apply(&self.hub);
        Ok(())
    }

    /// Validate any stored credentials at application startup.
    ///
    /// With no stored credential this resolves to `Unauthenticated` without
    /// any network traffic. With one, the state passes through `Verifying`
    /// while the credential is checked and the profile fetched; any failure
    /// lands back in `Unauthenticated` silently (never `Error`), since the
    /// user did nothing wrong.
    #[instrument(skip(self))]
    pub async fn startup_verify(&self) -> Result<SessionState> {
        let epoch = self.begin();

        let access = match self.store.get(CredentialKind::Access).await {
            Some(access) => access,
            None => {
                debug!("No stored credentials, starting signed out");
                self.commit_if_current(epoch, |hub| {
                    hub.publish(SessionState::Unauthenticated, None);
                })
                .await?;
                return Ok(SessionState::Unauthenticated);
            }
        };

        // Epoch-guarded like every other publish: the store read above is a
        // suspension point, and a newer operation may have committed since.
        self.commit_if_current(epoch, |hub| {
            hub.publish(SessionState::Verifying, Some(SessionEvent::Verifying));
        })
        .await?;

        let verified = match self.identity.verify(&access).await {
            Ok(()) => self.identity.me(&access).await,
            Err(e) => Err(e),
        };

        match verified {
            Ok(user) => {
                info!(handle = %user.handle, "Stored session verified");
                let state = SessionState::Authenticated(user.clone());
                self.commit_if_current(epoch, |hub| {
                    hub.publish(
                        state.clone(),
                        Some(SessionEvent::SignedIn {
                            user_id: user.id.to_string(),
                            handle: user.handle.clone(),
                        }),
                    );
                })
                .await?;
                Ok(SessionState::Authenticated(user))
            }
            Err(e) => {
                // Stale or unusable credentials; fail silently to signed out.
                warn!(error = %e, "Startup verification failed");
                if let Err(clear_err) = self.store.clear().await {
                    warn!(error = %clear_err, "Failed to clear stale credentials");
                }
                self.commit_if_current(epoch, |hub| {
                    hub.publish(
                        SessionState::Unauthenticated,
                        Some(SessionEvent::AuthFailed {
                            reason: "stored session is no longer valid".to_string(),
                            recoverable: true,
                        }),
                    );
                })
                .await?;
                Ok(SessionState::Unauthenticated)
            }
        }
    }

    /// Authenticate with an identifier and secret.
    ///
    /// On success the credential pair is persisted and the state becomes
    /// `Authenticated` with a fresh profile snapshot. On rejection the state
    /// becomes `Error` with a display reason, and any previously stored
    /// credentials are left untouched.
    #[instrument(skip(self, secret))]
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<User> {
        let epoch = self.begin();

        self.commit_if_current(epoch, |hub| {
            hub.publish(SessionState::Verifying, Some(SessionEvent::Verifying));
        })
        .await?;

        let pair = match self.identity.issue_credentials(identifier, secret).await {
            Ok(pair) => pair,
            Err(e) => return self.fail_login(epoch, e).await,
        };

        let user = match self.identity.me(&pair.access).await {
            Ok(user) => user,
            Err(e) => return self.fail_login(epoch, e.into()).await,
        };

        let _guard = self.commit.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Login superseded, discarding issued credentials");
            return Err(SessionError::Superseded);
        }

        // Persist before publishing: an Authenticated state with an empty
        // store would break every subsequent pipeline call. A persist failure
        // is a failed login and must land in a terminal state.
        if let Err(e) = self.store.store_pair(&pair).await {
            let reason = e.to_string();
            warn!(error = %reason, "Failed to persist issued credentials");
            self.hub.publish(
                SessionState::Error(reason.clone()),
                Some(SessionEvent::AuthFailed {
                    reason,
                    recoverable: false,
                }),
            );
            return Err(e);
        }

        info!(handle = %user.handle, "User signed in");
        self.hub.publish(
            SessionState::Authenticated(user.clone()),
            Some(SessionEvent::SignedIn {
                user_id: user.id.to_string(),
                handle: user.handle.clone(),
            }),
        );
        Ok(user)
    }

    async fn fail_login(&self, epoch: u64, error: SessionError) -> Result<User> {
        let reason = match &error {
            SessionError::InvalidCredentials(reason) => reason.clone(),
            other => other.to_string(),
        };
        let recoverable = matches!(error, SessionError::InvalidCredentials(_));

        warn!(reason = %reason, "Login failed");
        self.commit_if_current(epoch, |hub| {
            hub.publish(
                SessionState::Error(reason.clone()),
                Some(SessionEvent::AuthFailed {
                    reason,
                    recoverable,
                }),
            );
        })
        .await?;
        Err(error)
    }

    /// Sign out.
    ///
    /// Locally infallible: the server is notified best-effort, storage-clear
    /// failures are logged, and the state always ends `Unauthenticated`.
    /// Supersedes any login or verification in flight.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let epoch = self.begin();

        let access = self.store.get(CredentialKind::Access).await;
        self.identity.logout_notify(access.as_deref()).await;

        let _guard = self.commit.lock().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            // A newer operation owns the state now; it already started from
            // whatever the user last asked for.
            return;
        }

        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "Failed to clear credentials during logout");
        }

        info!("User signed out");
        self.hub
            .publish(SessionState::Unauthenticated, Some(SessionEvent::SignedOut));
    }

    /// Create a new account.
    ///
    /// Pure passthrough to the identity service: does not authenticate and
    /// never touches the session state or the credential store.
    pub async fn register(&self, account: &NewAccount) -> Result<()> {
        self.identity.register(account).await
    }
}
