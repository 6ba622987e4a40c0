//! Connection manager and session task.
//!
//! One [`ConnectionManager`] owns at most one live session. `connect()`
//! spawns a session task; further calls are no-ops until `disconnect()`
//! resets the latch or the session ends in [`ConnectionState::Failed`].
//!
//! # Session Task
//!
//! The task handles:
//!
//! - The handshake (transport open, `CONNECT`, wait for `CONNECTED`)
//! - Reconciling registry topics with live `SUBSCRIBE`s
//! - Routing `MESSAGE` bodies to topic listeners
//! - Reconnect with backoff, resubscribing every active topic
//! - Graceful `DISCONNECT` on shutdown
//!
//! # States
//!
//! | From | To | Trigger |
//! |------|----|---------|
//! | `Disconnected` | `Connecting` | `connect()` |
//! | `Connecting` / `Reconnecting` | `Connected` | `CONNECTED` received |
//! | `Connecting` / `Connected` | `Reconnecting` | handshake failed or session lost |
//! | `Reconnecting` | `Failed` | reconnect disabled or attempts exhausted |
//! | any | `Disconnected` | `disconnect()` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

use crate::auth::TokenSource;
use crate::error::{Error, Result};
use crate::identifiers::{SessionGeneration, SubscriptionId};
use crate::protocol::{Command, Frame, Protocol};
use crate::transport::{Endpoint, FrameSink, FrameStream, Link, Transport};

use super::options::ClientOptions;
use super::registry::TopicRegistry;

// ============================================================================
// Constants
// ============================================================================

/// Heart-beats are not negotiated; SockJS carries its own.
const HEART_BEAT: (u32, u32) = (0, 0);

// ============================================================================
// ConnectionState
// ============================================================================

/// Observable state of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session.
    #[default]
    Disconnected,
    /// First handshake in flight.
    Connecting,
    /// `CONNECTED` received; topics are live.
    Connected,
    /// Waiting for or performing reconnect attempt `attempt` (1-based).
    Reconnecting {
        /// Attempt number.
        attempt: u32,
    },
    /// Gave up reconnecting. `connect()` may start a new session.
    Failed {
        /// Last error.
        reason: String,
    },
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Connected`].
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// Latch entry for the live session.
struct SessionHandle {
    generation: SessionGeneration,
    shutdown_tx: oneshot::Sender<()>,
}

struct ManagerShared {
    endpoint: Endpoint,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenSource>>,
    registry: TopicRegistry,
    session: Mutex<Option<SessionHandle>>,
    next_generation: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
    handshakes: Arc<AtomicU64>,
}

impl ManagerShared {
    /// Publishes `state` if `generation` still owns the latch.
    fn publish(&self, generation: SessionGeneration, state: ConnectionState) -> bool {
        let session = self.session.lock();
        if session.as_ref().is_some_and(|s| s.generation == generation) {
            self.state_tx.send_replace(state);
            true
        } else {
            false
        }
    }

    /// Releases the latch held by `generation` and publishes `state`.
    fn finish(&self, generation: SessionGeneration, state: ConnectionState) {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|s| s.generation == generation) {
            *session = None;
            self.state_tx.send_replace(state);
        }
    }
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Owns the single shared session of a client.
///
/// Cheap to clone; all clones control the same session.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<ManagerShared>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.shared.endpoint.url().as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager. No connection is made until [`connect`](Self::connect).
    pub fn new(
        endpoint: Endpoint,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        tokens: Option<Arc<dyn TokenSource>>,
        registry: TopicRegistry,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(ManagerShared {
                endpoint,
                options,
                transport,
                tokens,
                registry,
                session: Mutex::new(None),
                next_generation: AtomicU64::new(0),
                state_tx,
                handshakes: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    /// Starts a session unless one is already live or connecting.
    ///
    /// Returns immediately; the handshake runs on a spawned task. Use
    /// [`wait_connected`](Self::wait_connected) to await it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(&self) {
        let mut session = self.shared.session.lock();
        if let Some(live) = session.as_ref() {
            trace!(generation = %live.generation, "Session already active");
            return;
        }

        let generation =
            SessionGeneration(self.shared.next_generation.fetch_add(1, Ordering::SeqCst) + 1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *session = Some(SessionHandle {
            generation,
            shutdown_tx,
        });
        self.shared.state_tx.send_replace(ConnectionState::Connecting);

        let task = Session {
            generation,
            shared: Arc::downgrade(&self.shared),
            endpoint: self.shared.endpoint.clone(),
            options: self.shared.options.clone(),
            transport: Arc::clone(&self.shared.transport),
            tokens: self.shared.tokens.clone(),
            registry: self.shared.registry.clone(),
            handshakes: Arc::clone(&self.shared.handshakes),
        };

        info!(%generation, endpoint = self.shared.endpoint.url().path(), "Connecting");
        tokio::spawn(task.run(shutdown_rx));
    }

    /// Ends the live session, if any, and resets the latch.
    ///
    /// The session task sends `DISCONNECT` and closes the transport in the
    /// background. State is [`ConnectionState::Disconnected`] on return.
    pub fn disconnect(&self) {
        let handle = {
            let mut session = self.shared.session.lock();
            let handle = session.take();
            self.shared
                .state_tx
                .send_replace(ConnectionState::Disconnected);
            handle
        };

        if let Some(handle) = handle {
            info!(generation = %handle.generation, "Disconnecting");
            let _ = handle.shutdown_tx.send(());
        }
    }

    /// Waits until connected, using the configured handshake timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if not connected in time
    /// - [`Error::Connection`] if the session ended in `Failed`
    /// - [`Error::NotConnected`] if no session is active
    pub async fn wait_connected(&self) -> Result<()> {
        self.wait_connected_for(self.shared.options.connect_timeout)
            .await
    }

    /// Waits until connected, giving up after `limit`.
    ///
    /// # Errors
    ///
    /// Same as [`wait_connected`](Self::wait_connected).
    pub async fn wait_connected_for(&self, limit: Duration) -> Result<()> {
        let mut state_rx = self.shared.state_tx.subscribe();

        let wait = async move {
            loop {
                let state = state_rx.borrow_and_update().clone();
                match state {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected => return Err(Error::NotConnected),
                    ConnectionState::Failed { reason } => return Err(Error::connection(reason)),
                    ConnectionState::Connecting | ConnectionState::Reconnecting { .. } => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(Error::ConnectionClosed);
                }
            }
        };

        timeout(limit, wait)
            .await
            .map_err(|_| Error::connection_timeout(millis(limit)))?
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state_tx.borrow().is_connected()
    }

    /// Returns the number of handshakes attempted so far.
    #[inline]
    #[must_use]
    pub fn handshake_count(&self) -> u64 {
        self.shared.handshakes.load(Ordering::SeqCst)
    }

    /// Returns the endpoint without a token attached.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    /// Returns the topic registry served by this manager.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TopicRegistry {
        &self.shared.registry
    }
}

impl Drop for ManagerShared {
    fn drop(&mut self) {
        // Dropping the shutdown sender stops the session task.
        if let Some(handle) = self.session.get_mut().take() {
            debug!(generation = %handle.generation, "Client dropped, ending session");
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// How a live session ended.
enum SessionEnd {
    Shutdown,
    Lost(Error),
}

/// State owned by one session task.
struct Session {
    generation: SessionGeneration,
    shared: Weak<ManagerShared>,
    endpoint: Endpoint,
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenSource>>,
    registry: TopicRegistry,
    handshakes: Arc<AtomicU64>,
}

impl Session {
    /// Session loop: handshake, drive, back off, repeat.
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut attempt: u32 = 0;

        loop {
            let established = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!(generation = %self.generation, "Shutdown during handshake");
                    return;
                }
                result = self.establish() => result,
            };

            let error = match established {
                Ok(link) => {
                    attempt = 0;
                    if !self.publish(ConnectionState::Connected) {
                        return;
                    }
                    info!(generation = %self.generation, "Connected");

                    match self.drive(link, &mut shutdown).await {
                        SessionEnd::Shutdown => return,
                        SessionEnd::Lost(e) => {
                            warn!(generation = %self.generation, error = %e, "Session lost");
                            e
                        }
                    }
                }
                Err(e) if !e.is_recoverable() => {
                    warn!(generation = %self.generation, error = %e, "Handshake rejected, not retrying");
                    self.finish(ConnectionState::Failed {
                        reason: e.to_string(),
                    });
                    return;
                }
                Err(e) => {
                    warn!(generation = %self.generation, attempt, error = %e, "Handshake failed");
                    e
                }
            };

            let Some(delay) = self.options.reconnect.delay_for(attempt) else {
                self.finish(ConnectionState::Failed {
                    reason: error.to_string(),
                });
                return;
            };
            attempt = attempt.saturating_add(1);

            if !self.publish(ConnectionState::Reconnecting { attempt }) {
                return;
            }
            debug!(
                generation = %self.generation,
                attempt,
                delay_ms = millis(delay),
                "Reconnecting after delay"
            );

            tokio::select! {
                biased;
                _ = &mut shutdown => return,
                () = sleep(delay) => {}
            }
        }
    }

    fn publish(&self, state: ConnectionState) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.publish(self.generation, state))
    }

    fn finish(&self, state: ConnectionState) {
        if let Some(shared) = self.shared.upgrade() {
            warn!(generation = %self.generation, %state, "Session finished");
            shared.finish(self.generation, state);
        }
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    /// Opens a link and completes the STOMP handshake within the timeout.
    async fn establish(&self) -> Result<Link> {
        let token = self.tokens.as_ref().and_then(|source| source.token());
        let endpoint = self.endpoint.clone().with_token(token);
        self.handshakes.fetch_add(1, Ordering::SeqCst);

        let limit = self.options.connect_timeout;
        timeout(limit, self.handshake(&endpoint))
            .await
            .map_err(|_| Error::connection_timeout(millis(limit)))?
    }

    async fn handshake(&self, endpoint: &Endpoint) -> Result<Link> {
        let mut link = self.transport.open(endpoint).await?;

        let accept_version = Protocol::accept_version(&self.options.protocols);
        link.sink
            .send(Frame::connect(&accept_version, &endpoint.host(), HEART_BEAT))
            .await?;

        loop {
            let frame = link.stream.next().await.ok_or(Error::ConnectionClosed)??;
            match frame.command {
                Command::Connected => {
                    self.check_version(&frame)?;
                    debug!(
                        version = frame.header("version").unwrap_or("1.0"),
                        server = frame.header("server").unwrap_or_default(),
                        "STOMP session established"
                    );
                    return Ok(link);
                }
                Command::Error => return Err(stomp_error(&frame)),
                other => trace!(command = %other, "Ignoring frame before CONNECTED"),
            }
        }
    }

    fn check_version(&self, connected: &Frame) -> Result<()> {
        let Some(version) = connected.header("version") else {
            return Ok(());
        };
        match Protocol::from_version(version) {
            Some(protocol) if self.options.protocols.contains(&protocol) => Ok(()),
            _ => Err(Error::protocol(format!(
                "broker negotiated unsupported STOMP version {version}"
            ))),
        }
    }

    // ========================================================================
    // Live Session
    // ========================================================================

    async fn drive(&self, link: Link, shutdown: &mut oneshot::Receiver<()>) -> SessionEnd {
        let Link {
            mut sink,
            mut stream,
        } = link;
        let mut live: FxHashMap<SubscriptionId, String> = FxHashMap::default();

        if let Err(e) = self.reconcile(&mut sink, &mut live).await {
            return SessionEnd::Lost(e);
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut *shutdown => {
                    self.close_gracefully(&mut sink, &mut stream).await;
                    return SessionEnd::Shutdown;
                }

                () = self.registry.changed() => {
                    if let Err(e) = self.reconcile(&mut sink, &mut live).await {
                        return SessionEnd::Lost(e);
                    }
                }

                item = stream.next() => match item {
                    Some(Ok(frame)) => {
                        if let Err(e) = self.handle_frame(frame) {
                            return SessionEnd::Lost(e);
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Lost(e),
                    None => return SessionEnd::Lost(Error::ConnectionClosed),
                },
            }
        }
    }

    /// Sends the difference between registry topics and `live`.
    async fn reconcile(
        &self,
        sink: &mut FrameSink,
        live: &mut FxHashMap<SubscriptionId, String>,
    ) -> Result<()> {
        let desired = self.registry.active();

        let mut stale: Vec<SubscriptionId> = live
            .keys()
            .filter(|id| !desired.iter().any(|(wanted, _)| wanted == *id))
            .copied()
            .collect();
        stale.sort_unstable();

        for id in stale {
            if let Some(topic) = live.remove(&id) {
                debug!(subscription = %id, topic, "Unsubscribing");
                sink.send(Frame::unsubscribe(id)).await?;
            }
        }

        for (id, topic) in desired {
            if live.contains_key(&id) {
                continue;
            }
            debug!(subscription = %id, topic, "Subscribing");
            sink.send(Frame::subscribe(id, &topic)).await?;
            live.insert(id, topic);
        }

        Ok(())
    }

    fn handle_frame(&self, frame: Frame) -> Result<()> {
        match frame.command {
            Command::Message => self.route_message(&frame),
            Command::Receipt => {
                trace!(receipt = frame.header("receipt-id").unwrap_or_default(), "Receipt");
            }
            Command::Error => return Err(stomp_error(&frame)),
            other => debug!(command = %other, "Ignoring unexpected frame"),
        }
        Ok(())
    }

    fn route_message(&self, frame: &Frame) {
        let Some(id) = frame.subscription() else {
            warn!(%frame, "MESSAGE without a known subscription header");
            return;
        };

        let payload: Value = match serde_json::from_str(&frame.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    subscription = %id,
                    destination = frame.header("destination").unwrap_or_default(),
                    error = %e,
                    "Dropping message with invalid JSON body"
                );
                return;
            }
        };

        let delivered = self.registry.dispatch(id, payload);
        trace!(subscription = %id, delivered, "Message dispatched");
    }

    /// Sends `DISCONNECT`, waits briefly for its receipt, closes the link.
    async fn close_gracefully(&self, sink: &mut FrameSink, stream: &mut FrameStream) {
        let receipt = format!("disconnect-{}", self.generation);

        if let Err(e) = sink.send(Frame::disconnect(&receipt)).await {
            debug!(error = %e, "DISCONNECT not sent, link already down");
            return;
        }

        let acknowledged = async {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(frame)
                        if frame.command == Command::Receipt
                            && frame.header("receipt-id") == Some(receipt.as_str()) =>
                    {
                        return true;
                    }
                    Ok(_) => {}
                    Err(_) => return false,
                }
            }
            false
        };

        match timeout(self.options.disconnect_timeout, acknowledged).await {
            Ok(true) => debug!(generation = %self.generation, "Disconnect acknowledged"),
            _ => debug!(generation = %self.generation, "Closing without disconnect receipt"),
        }

        let _ = sink.close().await;
    }
}

fn stomp_error(frame: &Frame) -> Error {
    Error::stomp(
        frame.header("message").unwrap_or("broker error"),
        frame.body.clone(),
    )
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::reconnect::ReconnectPolicy;
    use crate::transport::{DEFAULT_ENDPOINT_PATH, MemoryTransport};

    fn manager(transport: &MemoryTransport, options: ClientOptions) -> ConnectionManager {
        let endpoint = Endpoint::new("http://localhost:8080", DEFAULT_ENDPOINT_PATH).unwrap();
        ConnectionManager::new(
            endpoint,
            options,
            Arc::new(transport.clone()),
            None,
            TopicRegistry::new(16),
        )
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 2 }.to_string(),
            "reconnecting (attempt 2)"
        );
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_wait_connected_without_session() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport, ClientOptions::new());
        assert!(matches!(
            manager.wait_connected().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_sends_accept_version_and_host() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport, ClientOptions::new());
        manager.connect();

        let mut server = transport.accept().await.unwrap();
        let connect = server.accept_handshake().await.unwrap();
        assert_eq!(connect.header("accept-version"), Some("1.2"));
        assert_eq!(connect.header("host"), Some("localhost:8080"));
        assert_eq!(connect.header("heart-beat"), Some("0,0"));

        manager.wait_connected().await.unwrap();
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_unsupported_version_fails_handshake() {
        let transport = MemoryTransport::new();
        let manager = manager(
            &transport,
            ClientOptions::new().with_reconnect(ReconnectPolicy::disabled()),
        );
        manager.connect();

        let mut server = transport.accept().await.unwrap();
        server.expect(Command::Connect).await.unwrap();
        server
            .send(Frame::new(Command::Connected).with_header("version", "1.1"))
            .unwrap();

        let err = manager.wait_connected().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(matches!(manager.state(), ConnectionState::Failed { .. }));
    }

    #[tokio::test]
    async fn test_error_frame_during_handshake() {
        let transport = MemoryTransport::new();
        let manager = manager(
            &transport,
            ClientOptions::new().with_reconnect(ReconnectPolicy::disabled()),
        );
        manager.connect();

        let mut server = transport.accept().await.unwrap();
        server.expect(Command::Connect).await.unwrap();
        server
            .send(
                Frame::new(Command::Error)
                    .with_header("message", "Bad credentials")
                    .with_body("token expired"),
            )
            .unwrap();

        let err = manager.wait_connected().await.unwrap_err();
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[tokio::test]
    async fn test_graceful_disconnect_sends_receipt_request() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport, ClientOptions::new());
        manager.connect();

        let mut server = transport.accept().await.unwrap();
        server.accept_handshake().await.unwrap();
        manager.wait_connected().await.unwrap();

        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let disconnect = server.expect(Command::Disconnect).await.unwrap();
        let receipt = disconnect.header("receipt").unwrap().to_string();
        assert!(receipt.starts_with("disconnect-"));
        server
            .send(Frame::new(Command::Receipt).with_header("receipt-id", receipt))
            .unwrap();

        // The link closes once the receipt is seen.
        assert!(server.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_manager_ends_session() {
        let transport = MemoryTransport::new();
        let manager = manager(&transport, ClientOptions::new());
        manager.connect();

        let mut server = transport.accept().await.unwrap();
        server.accept_handshake().await.unwrap();
        manager.wait_connected().await.unwrap();

        drop(manager);
        assert_eq!(
            server.expect(Command::Disconnect).await.unwrap().command,
            Command::Disconnect
        );
    }
}
