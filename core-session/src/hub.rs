//! Session State Hub
//!
//! Single publisher of the reactive session state and the discrete session
//! events. Shared between the session manager (which drives the normal
//! lifecycle) and the request pipeline (which forces a logout when renewal
//! fails mid-session), so both write through the same channels.

use crate::types::SessionState;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use tokio::sync::watch;
use tracing::debug;

/// Shared publisher of session state and events.
///
/// State is a `watch` channel: observers always see the latest value and can
/// await changes. Discrete transitions additionally emit a [`SessionEvent`]
/// on the core event bus.
pub struct SessionHub {
    state_tx: watch::Sender<SessionState>,
    bus: EventBus,
}

impl SessionHub {
    pub fn new(bus: EventBus) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        Self { state_tx, bus }
    }

    /// Current session state snapshot.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to session state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// The underlying event bus.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Publish a new state, optionally with the event describing the
    /// transition.
    pub fn publish(&self, state: SessionState, event: Option<SessionEvent>) {
        debug!(state = %state, "Session state transition");
        // send_replace rather than send: the new state is current even with
        // no receivers subscribed yet.
        self.state_tx.send_replace(state);
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Emit a session event without a state change.
    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are advisory.
        self.bus.emit(CoreEvent::Session(event)).ok();
    }
}
