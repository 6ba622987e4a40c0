//! WebSocket transport over `tokio-tungstenite`.
//!
//! In [`TransportMode::SockJs`] every WebSocket text message is a SockJS
//! frame whose payload strings carry STOMP text. In
//! [`TransportMode::WebSocket`] the text messages are STOMP directly and
//! the configured STOMP versions are offered as subprotocols.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future, stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::sockjs::{self, SockJsFrame};
use crate::protocol::{DEFAULT_MAX_FRAME_SIZE, Frame, FrameDecoder, Protocol};

use super::{Endpoint, Link, Transport, TransportMode};

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Production transport.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Subprotocols offered in raw WebSocket mode.
    protocols: Vec<Protocol>,
    /// Decoder limit for one inbound frame.
    max_frame_size: usize,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl WebSocketTransport {
    /// Creates a transport offering `protocols` in raw WebSocket mode.
    #[inline]
    #[must_use]
    pub fn new(protocols: Vec<Protocol>) -> Self {
        Self {
            protocols,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Sets the largest inbound frame accepted, in bytes.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link> {
        let url = endpoint.websocket_url()?;
        let mut request = url.as_str().into_client_request()?;

        if endpoint.mode() == TransportMode::WebSocket && !self.protocols.is_empty() {
            let offered = self
                .protocols
                .iter()
                .map(Protocol::subprotocol)
                .collect::<Vec<_>>()
                .join(", ");
            let value = HeaderValue::from_str(&offered)
                .map_err(|e| Error::config(format!("invalid subprotocol list: {e}")))?;
            request.headers_mut().insert("Sec-WebSocket-Protocol", value);
        }

        let (ws_stream, response) = connect_async(request)
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        // Path only; the query carries the token.
        debug!(
            path = url.path(),
            status = %response.status(),
            mode = ?endpoint.mode(),
            "WebSocket connected"
        );

        let (ws_write, ws_read) = ws_stream.split();
        let mode = endpoint.mode();

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(move |frame: Frame| future::ready(encode_message(mode, &frame)));

        let mut decoder = FrameDecoder::with_max_frame_size(self.max_frame_size);
        let stream = ws_read
            .map(move |message| decode_message(mode, &mut decoder, message))
            .flat_map(stream::iter);

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn encode_message(mode: TransportMode, frame: &Frame) -> Result<Message> {
    trace!(%frame, "Frame out");
    let text = match mode {
        TransportMode::SockJs => sockjs::encode_messages(&[frame.encode()])?,
        TransportMode::WebSocket => frame.encode(),
    };
    Ok(Message::Text(text.into()))
}

fn decode_message(
    mode: TransportMode,
    decoder: &mut FrameDecoder,
    message: std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Vec<Result<Frame>> {
    let text = match message {
        Ok(Message::Text(text)) => text,
        Ok(Message::Close(close)) => {
            debug!(?close, "WebSocket closed by remote");
            return Vec::new();
        }
        // Ignore Binary, Ping, Pong
        Ok(_) => return Vec::new(),
        Err(e) => return vec![Err(e.into())],
    };

    match mode {
        TransportMode::WebSocket => {
            decoder.push(&text);
        }
        TransportMode::SockJs => match SockJsFrame::parse(&text) {
            Ok(SockJsFrame::Open) => {
                trace!("SockJS session open");
                return Vec::new();
            }
            Ok(SockJsFrame::Heartbeat) => {
                trace!("SockJS heartbeat");
                return Vec::new();
            }
            Ok(SockJsFrame::Messages(messages)) => {
                for message in &messages {
                    decoder.push(message);
                }
            }
            Ok(SockJsFrame::Close { code, reason }) => {
                return vec![Err(Error::sockjs_closed(code, reason))];
            }
            Err(e) => return vec![Err(e)],
        },
    }

    drain_frames(decoder)
}

fn drain_frames(decoder: &mut FrameDecoder) -> Vec<Result<Frame>> {
    let mut frames = Vec::new();
    loop {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                trace!(%frame, "Frame in");
                frames.push(Ok(frame));
            }
            Ok(None) => break,
            Err(e) => {
                frames.push(Err(e));
                break;
            }
        }
    }
    frames
}

// ============================================================================
// Tests
// ============================================================================
