use core_session::PipelineError;
use thiserror::Error;

/// Failures from the commerce clients.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// The underlying authenticated request failed.
    /// `PipelineError::Unauthenticated` passes through untouched so the UI
    /// can route to login.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The service replied 2xx but the body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl CommerceError {
    /// Whether the caller should route to login.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, CommerceError::Pipeline(e) if e.is_unauthenticated())
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
