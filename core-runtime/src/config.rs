//! # Core Configuration Module
//!
//! Provides configuration management for the client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `CoreConfig` instance holding the dependencies and settings the core
//! needs. It enforces fail-fast validation so a misconfigured host fails at
//! startup with an actionable message, not at the first network call.
//!
//! ## Required Dependencies
//!
//! - `identity_base_url` - Base address of the identity/commerce service
//! - `SecureStore` - Credential persistence (desktop default: OS keyring,
//!   injected when the `desktop-shims` feature is enabled)
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP transport (desktop default: reqwest)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .identity_base_url("https://api.example.com")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Configuration with Custom Bridges
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .identity_base_url("https://api.example.com")
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .renewal_timeout(Duration::from_secs(15))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Core configuration for the client core.
///
/// Holds all dependencies and settings required to initialize the core.
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the identity/commerce service, without a trailing path
    pub identity_base_url: Url,

    /// HTTP transport for all outbound calls
    pub http_client: Arc<dyn HttpClient>,

    /// Secure credential storage
    pub secure_store: Arc<dyn SecureStore>,

    /// Upper bound on a single credential-renewal round trip. `None` means
    /// fail-fast: only the transport's own timeout applies.
    pub renewal_timeout: Option<Duration>,

    /// Buffer size of the core event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("identity_base_url", &self.identity_base_url.as_str())
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("renewal_timeout", &self.renewal_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The base URL uses http or https
    /// - The renewal timeout, when set, is non-zero
    /// - The event buffer size is non-zero
    pub fn validate(&self) -> Result<()> {
        match self.identity_base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Config(format!(
                    "Identity base URL must use http or https, got '{}'",
                    other
                )));
            }
        }

        if self.renewal_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "Renewal timeout must be greater than zero when set".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn secure_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required for credential persistence. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
                 Mobile: inject platform-native secure storage (Keychain/Keystore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(secure_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for network access. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP adapter."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Incrementally set options, then call
/// [`build()`](CoreConfigBuilder::build). The builder validates required
/// dependencies and produces actionable error messages.
#[derive(Default)]
pub struct CoreConfigBuilder {
    identity_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    renewal_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the identity service base URL (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .identity_base_url("https://api.example.com");
    /// ```
    pub fn identity_base_url(mut self, url: impl Into<String>) -> Self {
        self.identity_base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// The secure store persists the session credential pair. It must provide
    /// platform-appropriate security (Keychain on macOS, Keystore on Android,
    /// etc.). If not provided, the desktop default (OS keyring) is used when
    /// the `desktop-shims` feature is enabled.
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Bounds a single credential-renewal round trip.
    ///
    /// When unset, renewal relies on the transport's own timeout (fail-fast
    /// policy). When set, a renewal exceeding the bound counts as a renewal
    /// failure and forces logout.
    pub fn renewal_timeout(mut self, timeout: Duration) -> Self {
        self.renewal_timeout = Some(timeout);
        self
    }

    /// Sets the event bus buffer size.
    ///
    /// Default: 100. Subscribers lagging behind by more than this many
    /// events start missing events.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The identity base URL is missing or unparseable
    /// - A required bridge is missing and no platform default exists
    /// - A configuration value is invalid
    pub fn build(self) -> Result<CoreConfig> {
        let raw_url = self.identity_base_url.ok_or_else(|| {
            Error::Config(
                "Identity base URL is required. Use .identity_base_url() to set it.".to_string(),
            )
        })?;

        let identity_base_url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("Invalid identity base URL '{}': {}", raw_url, e)))?;

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = CoreConfig {
            identity_base_url,
            http_client,
            secure_store,
            renewal_timeout: self.renewal_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
