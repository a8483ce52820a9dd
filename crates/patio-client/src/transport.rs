//! Transport connection manager — one websocket at a time, manual reconnect.
//!
//! The socket itself runs in a background task created by a [`Connector`].
//! Everything the socket observes (open, text frame, error, close) is sent
//! back as a [`TransportEvent`] on a single channel, and the owner of the
//! [`Transport`] feeds those events into [`Transport::handle_event`] from its
//! event loop.  All state changes therefore happen on one task, in arrival
//! order.
//!
//! Each socket is tagged with a generation number.  Events carrying an older
//! generation come from a socket that has been replaced and are ignored, so
//! a reconnect can never layer a second live socket on top of the first.
//!
//! There is no automatic retry: after a close the manager stays
//! disconnected until [`Transport::reconnect`] is called.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use patio_proto::protocol::OutboundCommand;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

// ── TransportEvent ────────────────────────────────────────────────────────────

/// Everything a socket task reports back to the owner.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened { generation: u64 },
    Frame { generation: u64, text: String },
    Error { generation: u64, message: String },
    Closed { generation: u64 },
}

impl TransportEvent {
    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::Opened { generation }
            | TransportEvent::Frame { generation, .. }
            | TransportEvent::Error { generation, .. }
            | TransportEvent::Closed { generation } => *generation,
        }
    }
}

/// What a handled event means to the layer above.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connection(bool),
    Frame(String),
}

// ── Connector seam ────────────────────────────────────────────────────────────

/// Write side of one live socket.
#[derive(Debug)]
pub struct SocketHandle {
    outbound: mpsc::UnboundedSender<String>,
    task: Option<AbortHandle>,
}

impl SocketHandle {
    pub fn new(outbound: mpsc::UnboundedSender<String>, task: Option<AbortHandle>) -> Self {
        Self { outbound, task }
    }

    fn send(&self, frame: String) -> bool {
        self.outbound.send(frame).is_ok()
    }

    /// Tear the socket down.  Safe on a socket that already closed.
    fn close(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

/// Creates sockets.  The real implementation is [`WsConnector`]; tests plug
/// in fakes.
pub trait Connector {
    fn open(
        &mut self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> SocketHandle;
}

/// Handshakes that take longer than this are abandoned.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `tokio-tungstenite` websocket connector.
#[derive(Debug, Clone, Copy)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WsConnector {
    fn open(
        &mut self,
        url: &str,
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> SocketHandle {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            url.to_string(),
            generation,
            self.connect_timeout,
            events,
            out_rx,
        ));
        SocketHandle::new(out_tx, Some(task.abort_handle()))
    }
}

async fn run_socket(
    url: String,
    generation: u64,
    connect_timeout: Duration,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
) {
    // A stalled handshake still has to end in `Closed`.
    let attempt = match timeout(connect_timeout, connect_async(url.as_str())).await {
        Ok(Ok((ws, _))) => Ok(ws),
        Ok(Err(e)) => Err(format!("connect {}: {}", url, e)),
        Err(_) => Err(format!(
            "connect {}: no handshake after {:?}",
            url, connect_timeout
        )),
    };
    let ws = match attempt {
        Ok(ws) => ws,
        Err(message) => {
            let _ = events.send(TransportEvent::Error {
                generation,
                message,
            });
            let _ = events.send(TransportEvent::Closed { generation });
            return;
        }
    };
    if events.send(TransportEvent::Opened { generation }).is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            frame = out_rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        let _ = events.send(TransportEvent::Error {
                            generation,
                            message: format!("send: {}", e),
                        });
                        break;
                    }
                }
                // Handle dropped: the owner has let go of this socket.
                None => {
                    let _ = write.close().await;
                    break;
                }
            },

            msg = read.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(TransportEvent::Frame { generation, text }).is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                // Binary, ping and pong frames carry nothing for us.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error {
                        generation,
                        message: format!("read: {}", e),
                    });
                    break;
                }
            },
        }
    }

    let _ = events.send(TransportEvent::Closed { generation });
}

// ── Transport ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Connecting,
    Open,
}

type ConnectionListener = Box<dyn FnMut(bool)>;

pub struct Transport<C: Connector = WsConnector> {
    url: String,
    connector: C,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    socket: Option<SocketHandle>,
    generation: u64,
    phase: Phase,
    listeners: Vec<ConnectionListener>,
}

impl<C: Connector> Transport<C> {
    /// Build a manager for `url`.  Nothing is opened until [`connect`].
    ///
    /// The returned receiver yields every [`TransportEvent`]; the owner must
    /// pass each one to [`handle_event`].
    ///
    /// [`connect`]: Transport::connect
    /// [`handle_event`]: Transport::handle_event
    pub fn new(
        url: impl Into<String>,
        connector: C,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Self {
            url: url.into(),
            connector,
            events_tx,
            socket: None,
            generation: 0,
            phase: Phase::Closed,
            listeners: Vec::new(),
        };
        (transport, events_rx)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    pub fn is_connecting(&self) -> bool {
        self.phase == Phase::Connecting
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    /// Open a fresh socket, replacing (and closing) any existing one.
    pub fn connect(&mut self) {
        if let Some(old) = self.socket.take() {
            old.close();
        }
        self.generation += 1;
        info!("Transport: connecting to {} (socket #{})", self.url, self.generation);
        self.phase = Phase::Connecting;
        let handle = self
            .connector
            .open(&self.url, self.generation, self.events_tx.clone());
        self.socket = Some(handle);
    }

    /// Reconnect after a disconnect.  No-op while open or while a connect
    /// is already in flight.
    pub fn reconnect(&mut self) {
        match self.phase {
            Phase::Open => debug!("Transport: reconnect ignored, already open"),
            Phase::Connecting => debug!("Transport: reconnect ignored, connect in flight"),
            Phase::Closed => self.connect(),
        }
    }

    /// Subscribe to connection-state changes.  The listener is called
    /// immediately with the current state, then on every change.
    pub fn on_connection_change(&mut self, mut listener: impl FnMut(bool) + 'static) {
        listener(self.is_open());
        self.listeners.push(Box::new(listener));
    }

    /// Send a raw frame.  Dropped (returning `false`) unless open.
    pub fn send(&mut self, frame: String) -> bool {
        if self.phase != Phase::Open {
            debug!("Transport: not open, dropping frame {}", frame);
            return false;
        }
        match &self.socket {
            Some(socket) => socket.send(frame),
            None => false,
        }
    }

    /// Apply one socket event.
    pub fn handle_event(&mut self, event: TransportEvent) -> Option<Inbound> {
        if event.generation() != self.generation {
            debug!(
                "Transport: ignoring event from replaced socket #{}",
                event.generation()
            );
            return None;
        }

        match event {
            TransportEvent::Opened { .. } => {
                info!("Transport: connected to {}", self.url);
                self.phase = Phase::Open;
                self.notify(true);
                // Bootstrap: ask for a full snapshot.
                let query = OutboundCommand::Query.to_envelope();
                self.send(query.encode());
                Some(Inbound::Connection(true))
            }
            TransportEvent::Frame { text, .. } => Some(Inbound::Frame(text)),
            TransportEvent::Error { message, .. } => {
                warn!("Transport: socket error: {}", message);
                None
            }
            TransportEvent::Closed { .. } => {
                info!("Transport: disconnected from {}", self.url);
                self.phase = Phase::Closed;
                self.socket = None;
                self.notify(false);
                Some(Inbound::Connection(false))
            }
        }
    }

    fn notify(&mut self, open: bool) {
        for listener in self.listeners.iter_mut() {
            listener(open);
        }
    }
}
