//! Builder pattern for channel configuration.
//!
//! Provides a fluent API for configuring and creating [`Channel`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use panel_channel::{Channel, Endpoint, ReconnectPolicy};
//!
//! # fn example() -> panel_channel::Result<()> {
//! let channel = Channel::builder()
//!     .endpoint(Endpoint::new("ns9999.local").with_device("ns9999"))
//!     .request_timeout(Duration::from_secs(30))
//!     .reconnect(ReconnectPolicy::exponential(
//!         Duration::from_millis(500),
//!         Duration::from_secs(30),
//!     ))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::Endpoint;

use super::core::Channel;
use super::reconnect::ReconnectPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Default time a request may wait for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// ChannelOptions
// ============================================================================

/// Validated channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Socket URL.
    pub url: Url,
    /// Default request timeout.
    pub request_timeout: Duration,
    /// Automatic reconnection policy.
    pub reconnect: ReconnectPolicy,
}

// ============================================================================
// ChannelBuilder
// ============================================================================

/// Builder for configuring a [`Channel`] instance.
///
/// Use [`Channel::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    /// Raw socket URL.
    url: Option<String>,
    /// Structured endpoint.
    endpoint: Option<Endpoint>,
    /// Default request timeout.
    request_timeout: Duration,
    /// Reconnection policy.
    reconnect: ReconnectPolicy,
}

impl Default for ChannelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ChannelBuilder Implementation
// ============================================================================

impl ChannelBuilder {
    /// Creates a builder with default timeout and no reconnection.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: None,
            endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::disabled(),
        }
    }

    /// Sets the socket URL directly (`ws://` or `wss://`).
    ///
    /// Replaces any endpoint set earlier.
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self.endpoint = None;
        self
    }

    /// Sets the socket address from an [`Endpoint`].
    ///
    /// Replaces any URL set earlier.
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self.url = None;
        self
    }

    /// Sets the default request timeout.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the reconnection policy.
    #[inline]
    #[must_use]
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Validates the configuration into [`ChannelOptions`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no address is set, the scheme is not `ws`/`wss`,
    ///   or the timeout is zero
    /// - [`Error::InvalidUrl`] if the URL does not parse
    pub fn options(&self) -> Result<ChannelOptions> {
        let url = self.validate_url()?;

        if self.request_timeout.is_zero() {
            return Err(Error::config("request timeout must be greater than zero"));
        }

        Ok(ChannelOptions {
            url,
            request_timeout: self.request_timeout,
            reconnect: self.reconnect.clone(),
        })
    }

    /// Builds the channel. The channel starts disconnected.
    ///
    /// # Errors
    ///
    /// See [`options`](Self::options).
    pub fn build(self) -> Result<Channel> {
        let options = self.options()?;
        Ok(Channel::with_options(options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ChannelBuilder {
    /// Resolves and checks the socket URL.
    fn validate_url(&self) -> Result<Url> {
        let url = match (&self.endpoint, &self.url) {
            (Some(endpoint), _) => endpoint.to_url()?,
            (None, Some(raw)) => Url::parse(raw)?,
            (None, None) => {
                return Err(Error::config(
                    "socket address is required. Use .url() or .endpoint() to set it.\n\
                     Example: Channel::builder().url(\"ws://10.0.0.5:2026/ws\")",
                ));
            }
        };

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::config(format!(
                "socket URL scheme must be ws or wss, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ChannelBuilder::new()
            .url("ws://127.0.0.1:2026/ws")
            .options()
            .expect("valid");

        assert_eq!(options.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(options.request_timeout.as_millis(), 60_000);
        assert!(!options.reconnect.is_enabled());
    }

    #[test]
    fn test_missing_address() {
        let err = ChannelBuilder::new().options().expect_err("no address");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_rejects_http_scheme() {
        let err = ChannelBuilder::new()
            .url("https://panel.example.com/ws")
            .options()
            .expect_err("wrong scheme");
        assert!(err.to_string().contains("ws or wss"));
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let err = ChannelBuilder::new()
            .url("::not a url::")
            .options()
            .expect_err("bad url");
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = ChannelBuilder::new()
            .url("ws://h/ws")
            .request_timeout(Duration::ZERO)
            .options()
            .expect_err("zero timeout");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_endpoint_overrides_url() {
        let options = ChannelBuilder::new()
            .url("ws://ignored/ws")
            .endpoint(Endpoint::new("device.local").secure(true))
            .options()
            .expect("valid");
        assert_eq!(options.url.as_str(), "wss://device.local:2026/ws");
    }
}
