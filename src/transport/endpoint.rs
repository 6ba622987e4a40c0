//! Tracker endpoint addressing.
//!
//! Builds the WebSocket URL from the page base URL, the server path and
//! the optional bearer token.
//!
//! # URL Layout
//!
//! ```text
//! http://host/app/  +  /websocket/tracker
//!   → SockJS:    ws://host/app/websocket/tracker/{server}/{session}/websocket?access_token=…
//!   → WebSocket: ws://host/app/websocket/tracker?access_token=…
//! ```

// ============================================================================
// Imports
// ============================================================================

use rand::Rng;
use rand::distributions::Alphanumeric;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default server path of the tracker endpoint.
pub const DEFAULT_ENDPOINT_PATH: &str = "/websocket/tracker";

/// Query parameter carrying the bearer token.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Length of a generated SockJS session id.
const SOCKJS_SESSION_ID_LEN: usize = 8;

// ============================================================================
// TransportMode
// ============================================================================

/// How STOMP frames are carried on the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// SockJS `websocket` transport (framed messages).
    #[default]
    SockJs,
    /// Plain WebSocket with STOMP subprotocol negotiation.
    WebSocket,
}

// ============================================================================
// Endpoint
// ============================================================================

/// Resolved tracker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP(S) or WS(S) URL of the endpoint, without query.
    url: Url,
    /// Framing used on the socket.
    mode: TransportMode,
    /// Bearer token for this handshake.
    token: Option<String>,
}

impl Endpoint {
    /// Joins `base_url` and `path`.
    ///
    /// A trailing slash on the base path is dropped before joining, so
    /// `http://host/app/` and `http://host/app` resolve identically.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `base_url` does not parse
    /// - [`Error::Config`] if the scheme is not http, https, ws or wss
    pub fn new(base_url: &str, path: &str) -> Result<Self> {
        let mut url = Url::parse(base_url)?;
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(Error::config(format!(
                "unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }

        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self {
            url,
            mode: TransportMode::default(),
            token: None,
        })
    }

    /// Sets the transport mode.
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets or clears the bearer token.
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Returns the endpoint URL as configured (no query, no SockJS suffix).
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the transport mode.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Returns the bearer token, if set.
    #[inline]
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the value for the STOMP `host` header.
    #[must_use]
    pub fn host(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => "/".to_string(),
        }
    }

    /// Builds the WebSocket URL with fresh random SockJS ids.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL cannot be rewritten.
    pub fn websocket_url(&self) -> Result<Url> {
        let mut rng = rand::thread_rng();
        let server_id = format!("{:03}", rng.gen_range(0..1000));
        let session_id: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(SOCKJS_SESSION_ID_LEN)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        self.websocket_url_with(&server_id, &session_id)
    }

    /// Builds the WebSocket URL with the given SockJS ids.
    ///
    /// The ids are ignored in [`TransportMode::WebSocket`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL cannot be rewritten.
    pub fn websocket_url_with(&self, server_id: &str, session_id: &str) -> Result<Url> {
        let mut url = self.url.clone();

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            _ => "wss",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("cannot use {scheme} scheme for {}", self.url)))?;

        if self.mode == TransportMode::SockJs {
            url.path_segments_mut()
                .map_err(|()| Error::config(format!("endpoint has no path: {}", self.url)))?
                .pop_if_empty()
                .push(server_id)
                .push(session_id)
                .push("websocket");
        }

        if let Some(token) = &self.token {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
