use thiserror::Error;

/// Failures surfaced by the request pipeline.
///
/// The pipeline recovers exactly one authentication failure per request
/// transparently (via renewal); everything else propagates untouched.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No valid credential could be produced: absent, expired and
    /// unrenewable, or rejected. Surfaces to the UI as "please log in".
    #[error("Not authenticated")]
    Unauthenticated,

    /// Any non-authentication failure from the upstream service. Not retried.
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The transport itself failed (connection, TLS, timeout). Treated by
    /// callers like an upstream failure: not retried.
    #[error("Transport error: {0}")]
    Transport(#[from] bridge_traits::BridgeError),
}

impl PipelineError {
    /// Whether this failure means the caller should route to login.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, PipelineError::Unauthenticated)
    }
}

/// Failures surfaced by the session manager.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A deliberate login attempt was rejected by the identity service.
    /// Distinct from `PipelineError::Unauthenticated`: it does not disturb
    /// an existing valid session.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Registration was rejected (validation failure, duplicate account).
    #[error("Registration rejected: {0}")]
    Rejected(String),

    /// The operation's result was discarded because a newer login or
    /// verification superseded it while it was in flight.
    #[error("Superseded by a newer session operation")]
    Superseded,

    /// Secure storage could not persist the credential pair.
    #[error("Secure storage unavailable: {0}")]
    Storage(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
