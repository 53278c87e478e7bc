//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! This crate defines the contract between the client core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that is provided differently per platform (desktop,
//! mobile, embedded webview).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP transport with TLS
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//!   (Keychain/Keystore/Secret Service)
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations convert their native errors into it and keep the message
//! actionable (what failed, on which key or URL).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind `Arc<dyn ...>` handles.

pub mod error;
pub mod http;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::SecureStore;
