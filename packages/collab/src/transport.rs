//! Client transport seam.
//!
//! A [`Connector`] opens a [`Connection`]: an outbound frame sender, an
//! inbound frame receiver, and a guard owning whatever background work keeps
//! the connection alive. Closing the guard is synchronous: tasks are aborted
//! and close hooks run before `close` returns.

use crate::hub::RelayHub;
use crate::protocol::{ClientFrame, ProtocolError, ServerFrame};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Connection closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// What arrives on a connection
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Frame(ServerFrame),
    /// A frame that could not be decoded
    Malformed(String),
}

/// Cloneable handle for sending frames on a connection
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

impl FrameSender {
    pub fn new(tx: mpsc::UnboundedSender<ClientFrame>) -> Self {
        Self { tx }
    }

    pub fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Owns the background work of a connection
#[derive(Default)]
pub struct ConnectionGuard {
    tasks: Vec<JoinHandle<()>>,
    on_close: Vec<CloseHook>,
}

impl ConnectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close.push(Box::new(hook));
        self
    }

    /// Abort every task and run close hooks. Idempotent.
    pub fn close(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        for hook in self.on_close.drain(..) {
            hook();
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("tasks", &self.tasks.len())
            .field("on_close", &self.on_close.len())
            .finish()
    }
}

#[derive(Debug)]
pub struct Connection {
    pub sender: FrameSender,
    pub incoming: mpsc::UnboundedReceiver<Inbound>,
    pub guard: ConnectionGuard,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, TransportError>;
}

/// WebSocket connection to a remote relay
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        info!(url = %self.url, "connected to relay");

        let (mut ws_writer, mut ws_reader) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();

        // Writer task: outbound channel → socket
        let writer = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match frame.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "dropping unencodable frame");
                        continue;
                    }
                };
                if ws_writer.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = ws_writer.close().await;
        });

        // Reader task: socket → inbound channel
        let reader = tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                let inbound = match message {
                    Ok(Message::Text(text)) => match ServerFrame::decode(text.as_str()) {
                        Ok(frame) => Inbound::Frame(frame),
                        Err(e) => Inbound::Malformed(e.to_string()),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "relay socket error");
                        break;
                    }
                };
                if in_tx.send(inbound).is_err() {
                    break;
                }
            }
            debug!("relay socket reader finished");
        });

        Ok(Connection {
            sender: FrameSender::new(out_tx),
            incoming: in_rx,
            guard: ConnectionGuard::new().with_task(writer).with_task(reader),
        })
    }
}

/// In-process connection to a [`RelayHub`]
#[derive(Clone)]
pub struct LocalConnector {
    hub: RelayHub,
}

impl LocalConnector {
    pub fn new(hub: RelayHub) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl Connector for LocalConnector {
    async fn connect(&self) -> Result<Connection, TransportError> {
        let (client_id, mut member_rx) = self.hub.attach();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Inbound>();

        let forward = tokio::spawn(async move {
            while let Some(frame) = member_rx.recv().await {
                if in_tx.send(Inbound::Frame(frame)).is_err() {
                    break;
                }
            }
        });

        let hub = self.hub.clone();
        let pump = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                hub.handle(client_id, frame);
            }
        });

        let hub = self.hub.clone();
        Ok(Connection {
            sender: FrameSender::new(out_tx),
            incoming: in_rx,
            guard: ConnectionGuard::new()
                .with_task(forward)
                .with_task(pump)
                .on_close(move || hub.detach(client_id)),
        })
    }
}
