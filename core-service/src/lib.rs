//! Client core façade.
//!
//! Wires the host-provided bridges (HTTP transport, secure storage) and the
//! core configuration into one constructed object the host application owns.
//! Desktop apps typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig`] fall back to the reqwest transport and the OS keyring when
//! no bridges are injected.
//!
//! ```ignore
//! use core_runtime::CoreConfig;
//! use core_service::ClientCore;
//!
//! let config = CoreConfig::builder()
//!     .identity_base_url("https://api.example.com")
//!     .build()?;
//! let core = ClientCore::new(config)?;
//!
//! core.session().startup_verify().await?;
//! let plans = core.subscriptions().active_plans().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use core_commerce::{CatalogClient, SubscriptionClient};
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use core_runtime::CoreConfig;
use core_session::{
    CredentialStore, IdentityClient, RequestPipeline, SessionHub, SessionManager, SessionState,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Construct exactly one per application from a validated [`CoreConfig`];
/// every accessor hands out a shared view of the same session.
pub struct ClientCore {
    events: EventBus,
    hub: Arc<SessionHub>,
    session: SessionManager,
    catalog: CatalogClient,
    subscriptions: SubscriptionClient,
}

impl ClientCore {
    /// Wire the full client core from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let store = CredentialStore::new(config.secure_store.clone());
        let identity = Arc::new(IdentityClient::new(
            config.http_client.clone(),
            config.identity_base_url.clone(),
        ));
        let hub = Arc::new(SessionHub::new(events.clone()));

        let pipeline = Arc::new(RequestPipeline::new(
            config.http_client.clone(),
            config.identity_base_url.clone(),
            store.clone(),
            identity.clone(),
            hub.clone(),
            config.renewal_timeout,
        ));

        let session = SessionManager::new(store, identity, hub.clone());
        let catalog = CatalogClient::new(pipeline.clone());
        let subscriptions = SubscriptionClient::new(pipeline, events.clone());

        info!(base_url = %config.identity_base_url, "Client core initialized");

        Ok(Self {
            events,
            hub,
            session,
            catalog,
            subscriptions,
        })
    }

    /// The session lifecycle manager (login, logout, startup verification).
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// The product catalog client.
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// The plans and subscriptions client.
    pub fn subscriptions(&self) -> &SubscriptionClient {
        &self.subscriptions
    }

    /// The core event bus; subscribe for session and commerce events.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to session lifecycle events only.
    ///
    /// A convenience for hosts that drive navigation off sign-in/sign-out
    /// and expiry without caring about commerce traffic.
    pub fn session_events(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
            .filter(|event| matches!(event, CoreEvent::Session(_)))
    }

    /// Current session state snapshot.
    pub fn state(&self) -> SessionState {
        self.hub.state()
    }

    /// Subscribe to session state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.hub.subscribe()
    }
}
