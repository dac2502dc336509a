//! Control panel endpoint addressing.
//!
//! Builds the WebSocket URL a [`Channel`](crate::Channel) connects to:
//!
//! ```text
//! wss://ns9999.example.com:2026/ws?device=ns9999&token=...
//! └┬┘   └──────┬──────────┘ └┬─┘└┬┘ └──────────┬──────────┘
//! scheme      host          port path     query (optional)
//! ```
//!
//! The scheme mirrors the hosting page (`http` → `ws`, `https` → `wss`).

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Port the device control panel listens on.
pub const DEFAULT_PORT: u16 = 2026;

/// Path both ends of the control panel socket use.
pub const DEFAULT_PATH: &str = "/ws";

// ============================================================================
// TokenSource
// ============================================================================

/// Read-only view of a credential store.
///
/// The token is read once, when the endpoint is built.
pub trait TokenSource {
    /// Returns the current bearer token, if any.
    fn token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String>,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Address of a device control panel socket.
///
/// # Example
///
/// ```
/// use panel_channel::Endpoint;
///
/// let url = Endpoint::new("panel.example.com")
///     .secure(true)
///     .with_device("ns9999")
///     .with_token(Some("secret".to_string()))
///     .to_url()
///     .unwrap();
///
/// assert_eq!(
///     url.as_str(),
///     "wss://panel.example.com:2026/ws?device=ns9999&token=secret"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Use `wss` instead of `ws`.
    secure: bool,
    /// Host name or address.
    host: String,
    /// Explicit port; `None` uses the scheme default.
    port: Option<u16>,
    /// Socket path.
    path: String,
    /// Bearer token query parameter.
    token: Option<String>,
    /// Device selector query parameter.
    device: Option<String>,
}

impl Endpoint {
    /// Creates a plain `ws` endpoint on the default port and path.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            secure: false,
            host: host.into(),
            port: Some(DEFAULT_PORT),
            path: DEFAULT_PATH.to_string(),
            token: None,
            device: None,
        }
    }

    /// Creates an endpoint whose scheme mirrors the hosting page's origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `origin` does not parse, or
    /// [`Error::Config`] if its scheme is neither `http` nor `https`.
    pub fn from_page_origin(origin: &str, host: impl Into<String>) -> Result<Self> {
        let origin = Url::parse(origin)?;
        let secure = match origin.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(Error::config(format!(
                    "page origin scheme must be http or https, got {other}"
                )));
            }
        };

        Ok(Self::new(host).secure(secure))
    }

    /// Selects `wss` (`true`) or `ws` (`false`).
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets an explicit port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Uses the scheme's default port (e.g. behind a cloud proxy).
    #[inline]
    #[must_use]
    pub fn without_port(mut self) -> Self {
        self.port = None;
        self
    }

    /// Overrides the socket path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds the device selector query parameter.
    #[inline]
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Sets the bearer token query parameter. Empty tokens are ignored.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Reads the bearer token from a credential store.
    #[inline]
    #[must_use]
    pub fn token_from(self, source: &impl TokenSource) -> Self {
        let token = source.token();
        self.with_token(token)
    }

    /// Returns `true` for `wss` endpoints.
    #[inline]
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Returns the host.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Builds the connection URL.
    ///
    /// Query parameters are percent-encoded; `device` precedes `token`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty host, or
    /// [`Error::InvalidUrl`] if the parts do not form a valid URL.
    pub fn to_url(&self) -> Result<Url> {
        if self.host.trim().is_empty() {
            return Err(Error::config("endpoint host is empty"));
        }

        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{scheme}://{}", self.host))?;

        url.set_port(self.port)
            .map_err(|()| Error::config(format!("host {} cannot carry a port", self.host)))?;
        url.set_path(&self.path);

        if self.device.is_some() || self.token.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(device) = &self.device {
                query.append_pair("device", device);
            }
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint() {
        let url = Endpoint::new("10.0.0.5").to_url().expect("url");
        assert_eq!(url.as_str(), "ws://10.0.0.5:2026/ws");
    }

    #[test]
    fn test_scheme_mirrors_page_origin() {
        let secure = Endpoint::from_page_origin("https://panel.example.com", "device.local")
            .expect("https origin");
        assert!(secure.is_secure());
        assert_eq!(secure.to_url().expect("url").scheme(), "wss");

        let plain = Endpoint::from_page_origin("http://localhost:5173", "device.local")
            .expect("http origin");
        assert!(!plain.is_secure());
        assert_eq!(plain.to_url().expect("url").scheme(), "ws");
    }

    #[test]
    fn test_unsupported_origin_scheme() {
        let err = Endpoint::from_page_origin("file:///tmp/index.html", "device.local")
            .expect_err("file origin");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_query_parameters_are_encoded() {
        let url = Endpoint::new("proxy.example.com")
            .secure(true)
            .without_port()
            .with_device("ns9999")
            .with_token(Some("a b&c".to_string()))
            .to_url()
            .expect("url");

        assert_eq!(
            url.as_str(),
            "wss://proxy.example.com/ws?device=ns9999&token=a+b%26c"
        );
    }

    #[test]
    fn test_token_from_store() {
        let store = || Some("from-store".to_string());
        let url = Endpoint::new("h").token_from(&store).to_url().expect("url");
        assert_eq!(url.query(), Some("token=from-store"));

        let empty = || Some(String::new());
        let url = Endpoint::new("h").token_from(&empty).to_url().expect("url");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = Endpoint::new("  ").to_url().expect_err("empty host");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_custom_path_and_port() {
        let url = Endpoint::new("h")
            .with_port(8443)
            .with_path("/panel/ws")
            .to_url()
            .expect("url");
        assert_eq!(url.as_str(), "ws://h:8443/panel/ws");
    }
}
