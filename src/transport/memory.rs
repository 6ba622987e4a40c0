//! In-process transport.
//!
//! [`MemoryTransport`] hands every opened link to a server side
//! ([`ServerLink`]) that the caller scripts: answer the handshake, check
//! what the client subscribed to, push `MESSAGE` frames. It counts
//! handshakes and can refuse upcoming attempts.
//!
//! # Example
//!
//! ```ignore
//! let transport = MemoryTransport::new();
//! let client = TrackerClient::builder()
//!     .base_url("http://localhost:8080")
//!     .transport(transport.clone())
//!     .build()?;
//!
//! client.connect();
//! let mut server = transport.accept().await.unwrap();
//! server.accept_handshake().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{Command, Frame, FrameDecoder};

use super::{Endpoint, Link, Transport};

// ============================================================================
// Constants
// ============================================================================

/// How long [`ServerLink::recv`] waits for a client frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// MemoryTransport
// ============================================================================

/// Transport whose broker side runs in the same process.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    /// Number of `open` calls.
    handshakes: AtomicUsize,
    /// Number of upcoming `open` calls to fail.
    refusals: AtomicUsize,
    /// Endpoints passed to `open`, in order.
    endpoints: Mutex<Vec<Endpoint>>,
    /// Newly opened links, server side.
    accepted_tx: mpsc::UnboundedSender<ServerLink>,
    accepted_rx: AsyncMutex<mpsc::UnboundedReceiver<ServerLink>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// Creates a transport with no pending links.
    #[must_use]
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MemoryInner {
                handshakes: AtomicUsize::new(0),
                refusals: AtomicUsize::new(0),
                endpoints: Mutex::new(Vec::new()),
                accepted_tx,
                accepted_rx: AsyncMutex::new(accepted_rx),
            }),
        }
    }

    /// Returns the number of links requested so far, refused ones included.
    #[inline]
    #[must_use]
    pub fn handshake_count(&self) -> usize {
        self.inner.handshakes.load(Ordering::SeqCst)
    }

    /// Makes the next `count` open attempts fail with a connection error.
    pub fn refuse_next(&self, count: usize) {
        self.inner.refusals.fetch_add(count, Ordering::SeqCst);
    }

    /// Returns the endpoint of the most recent open attempt.
    #[must_use]
    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.inner.endpoints.lock().last().cloned()
    }

    /// Waits for the next link opened by a client.
    ///
    /// Returns `None` if nothing connects within five seconds.
    pub async fn accept(&self) -> Option<ServerLink> {
        let mut accepted = self.inner.accepted_rx.lock().await;
        timeout(RECV_TIMEOUT, accepted.recv()).await.ok().flatten()
    }

    /// Returns a link that was already opened, without waiting.
    pub async fn try_accept(&self) -> Option<ServerLink> {
        self.inner.accepted_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, endpoint: &Endpoint) -> Result<Link> {
        self.inner.handshakes.fetch_add(1, Ordering::SeqCst);
        self.inner.endpoints.lock().push(endpoint.clone());

        let refused = self
            .inner
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            debug!("Memory transport refused link");
            return Err(Error::connection("connection refused"));
        }

        let (client_tx, client_rx) = mpsc::unbounded_channel::<Frame>();
        let (server_tx, server_rx) = mpsc::unbounded_channel::<Result<Frame>>();

        let sink = sink::unfold(client_tx, |tx, frame: Frame| async move {
            tx.send(frame).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });
        let stream = stream::unfold(server_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        self.inner
            .accepted_tx
            .send(ServerLink {
                inbound: client_rx,
                outbound: server_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        Ok(Link {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

// ============================================================================
// ServerLink
// ============================================================================

/// Broker side of one in-memory link.
///
/// Dropping it closes the client's stream.
pub struct ServerLink {
    /// Frames sent by the client.
    inbound: mpsc::UnboundedReceiver<Frame>,
    /// Frames (or errors) delivered to the client.
    outbound: mpsc::UnboundedSender<Result<Frame>>,
}

impl ServerLink {
    /// Waits up to five seconds for the next client frame.
    ///
    /// Returns `None` if the client closed the link or nothing arrived.
    pub async fn recv(&mut self) -> Option<Frame> {
        timeout(RECV_TIMEOUT, self.inbound.recv()).await.ok().flatten()
    }

    /// Returns an already-sent client frame, without waiting.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.inbound.try_recv().ok()
    }

    /// Receives the next client frame and checks its command.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if no frame arrives
    /// - [`Error::Protocol`] if the command differs
    pub async fn expect(&mut self, command: Command) -> Result<Frame> {
        let frame = self.recv().await.ok_or(Error::ConnectionClosed)?;
        if frame.command != command {
            return Err(Error::protocol(format!(
                "expected {command}, client sent {}",
                frame.command
            )));
        }
        Ok(frame)
    }

    /// Reads `CONNECT` and answers `CONNECTED` (version 1.2).
    ///
    /// # Errors
    ///
    /// Same as [`ServerLink::expect`].
    pub async fn accept_handshake(&mut self) -> Result<Frame> {
        let connect = self.expect(Command::Connect).await?;
        self.send(
            Frame::new(Command::Connected)
                .with_header("version", "1.2")
                .with_header("heart-beat", "0,0"),
        )?;
        Ok(connect)
    }

    /// Sends a frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn send(&self, frame: Frame) -> Result<()> {
        self.outbound
            .send(Ok(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a `MESSAGE` for a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn send_message(
        &self,
        subscription: SubscriptionId,
        destination: &str,
        body: &str,
    ) -> Result<()> {
        self.send(
            Frame::new(Command::Message)
                .with_header("subscription", subscription.to_string())
                .with_header("destination", destination)
                .with_header("content-type", "application/json")
                .with_body(body),
        )
    }

    /// Sends raw STOMP text, decoded the way the WebSocket transport
    /// decodes inbound text. Decoding errors reach the client as stream
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn send_raw(&self, text: &str) -> Result<()> {
        let mut decoder = FrameDecoder::new();
        decoder.push(text);
        loop {
            let item = match decoder.next_frame() {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => return Ok(()),
                Err(e) => Err(e),
            };
            let failed = item.is_err();
            self.outbound
                .send(item)
                .map_err(|_| Error::ConnectionClosed)?;
            if failed {
                return Ok(());
            }
        }
    }

    /// Injects a transport error into the client's stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the client dropped the link.
    pub fn fail(&self, error: Error) -> Result<()> {
        self.outbound
            .send(Err(error))
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::{SinkExt, StreamExt};

    use crate::transport::DEFAULT_ENDPOINT_PATH;

    fn endpoint() -> Endpoint {
        Endpoint::new("http://localhost:8080", DEFAULT_ENDPOINT_PATH).unwrap()
    }

    #[tokio::test]
    async fn test_link_carries_frames_both_ways() {
        let transport = MemoryTransport::new();
        let mut link = transport.open(&endpoint()).await.unwrap();
        let mut server = transport.accept().await.unwrap();

        link.sink.send(Frame::new(Command::Connect)).await.unwrap();
        assert_eq!(server.recv().await.unwrap().command, Command::Connect);

        server.send(Frame::new(Command::Connected)).unwrap();
        let frame = link.stream.next().await.unwrap().unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(transport.handshake_count(), 1);
    }

    #[tokio::test]
    async fn test_dropping_server_ends_stream() {
        let transport = MemoryTransport::new();
        let mut link = transport.open(&endpoint()).await.unwrap();
        drop(transport.accept().await.unwrap());
        assert!(link.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_send_raw_surfaces_decode_error() {
        let transport = MemoryTransport::new();
        let mut link = transport.open(&endpoint()).await.unwrap();
        let server = transport.accept().await.unwrap();

        server
            .send_raw("RECEIPT\nreceipt-id:1\n\n\0MESSAGE\ncontent-length:x\n\n\0")
            .unwrap();

        let first = link.stream.next().await.unwrap().unwrap();
        assert_eq!(first.command, Command::Receipt);
        assert!(matches!(
            link.stream.next().await,
            Some(Err(Error::Protocol { .. }))
        ));
    }

    #[tokio::test]
    async fn test_refuse_next() {
        let transport = MemoryTransport::new();
        transport.refuse_next(1);
        assert!(transport.open(&endpoint()).await.is_err());
        assert!(transport.open(&endpoint()).await.is_ok());
        assert_eq!(transport.handshake_count(), 2);
    }

    #[tokio::test]
    async fn test_records_endpoint() {
        let transport = MemoryTransport::new();
        let with_token = endpoint().with_token(Some("t0k3n".to_string()));
        let _link = transport.open(&with_token).await.unwrap();
        assert_eq!(
            transport.last_endpoint().unwrap().token(),
            Some("t0k3n")
        );
    }
}
