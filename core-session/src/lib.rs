//! # Authenticated Session Core
//!
//! The session/token lifecycle manager and the request pipeline that wraps
//! every outbound API call with authentication and transparent renewal.
//!
//! ## Components
//!
//! - [`CredentialStore`](store::CredentialStore) - persistent holder for the
//!   access/renewal credential pair, backed by a host `SecureStore`
//! - [`IdentityClient`](identity::IdentityClient) - wire client for the
//!   identity service endpoints (issue, refresh, verify, profile, logout)
//! - [`RequestPipeline`](pipeline::RequestPipeline) - attaches the bearer
//!   credential to every outbound call, intercepts authentication failures,
//!   and retries exactly once after a coalesced renewal
//! - [`SessionManager`](manager::SessionManager) - orchestrates login, logout,
//!   and startup verification, and owns the reactive session state
//! - [`SessionHub`](hub::SessionHub) - shared publisher of session state and
//!   events, held by both the manager and the pipeline
//!
//! ## State model
//!
//! The session state is a watch channel owned by the hub. Every transition
//! also emits a [`SessionEvent`](core_runtime::events::SessionEvent) on the
//! core event bus; hosts react to events (e.g. navigate to a login screen on
//! `SessionExpired`) instead of being imperatively redirected.

pub mod error;
pub mod hub;
pub mod identity;
pub mod manager;
pub mod pipeline;
pub mod store;
pub mod types;

pub use error::{PipelineError, Result, SessionError};
pub use hub::SessionHub;
pub use identity::IdentityClient;
pub use manager::SessionManager;
pub use pipeline::RequestPipeline;
pub use store::{CredentialKind, CredentialStore};
pub use types::{CredentialPair, NewAccount, ProfileAttributes, Role, SessionState, User};
