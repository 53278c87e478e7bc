use thiserror::Error;

/// Aggregate error surfaced by the [`ClientCore`](crate::ClientCore) façade.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Session error: {0}")]
    Session(#[from] core_session::SessionError),

    #[error("Commerce error: {0}")]
    Commerce(#[from] core_commerce::CommerceError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
