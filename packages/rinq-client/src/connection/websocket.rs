//! WebSocket Connection
//!
//! Opens a WebSocket to a single peer, offers the subprotocol candidates
//! during the handshake and surfaces the lifecycle as events.

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::task::{ready, Context as TaskContext, Poll};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::http::Response;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::config::EndpointConfig;
use crate::connection::error::ConstructionError;
use crate::connection::event::{CloseFrame, ConnectionEvent, Payload};
use crate::connection::handler::{ConnectionHandler, ConnectionSummary};
use crate::connection::state::{ConnectionState, Lifecycle};
use crate::connection::subprotocol::{Encoding, SubprotocolList};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EVENT_BUFFER: usize = 100;

/// A single WebSocket connection to one remote peer.
///
/// Created in [`ConnectionState::Connecting`]; the handshake runs on a
/// background task from the moment of construction. Every connection
/// yields, in order: at most one `Opened`, then any number of `Message`s
/// (only after `Opened`), then exactly one `Closed`. After `Closed` the
/// connection is inert.
pub struct Connection {
    id: Uuid,
    target: String,
    candidates: SubprotocolList,
    subprotocol: Option<String>,
    lifecycle: Lifecycle,
    events: mpsc::Receiver<ConnectionEvent>,
    finished: bool,
}

impl Connection {
    /// Validate the arguments and start the handshake with default settings
    pub fn open<I, S>(target: &str, candidates: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = SubprotocolList::new(candidates)?;
        ConnectionBuilder::new(target, candidates).build()
    }

    /// Identifier used to correlate log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn candidates(&self) -> &SubprotocolList {
        &self.candidates
    }

    /// The subprotocol selected by the peer.
    ///
    /// `None` until `Opened` has been delivered, and afterwards when the
    /// peer agreed to none of the candidates.
    pub fn subprotocol(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    /// Encoding implied by the selected subprotocol, for routing payloads
    pub fn encoding(&self) -> Option<Encoding> {
        self.subprotocol().and_then(Encoding::from_subprotocol)
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.current_state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Wait for the next lifecycle event. Returns `None` once `Closed` has
    /// been delivered.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.next().await
    }

    /// Drive a handler until the connection closes
    pub async fn dispatch<H>(mut self, handler: &mut H) -> ConnectionSummary
    where
        H: ConnectionHandler + ?Sized,
    {
        let mut messages = 0u64;
        let mut close_frame = None;

        while let Some(event) = self.next_event().await {
            match event {
                ConnectionEvent::Opened { subprotocol } => {
                    handler.on_open(subprotocol.as_deref()).await;
                }
                ConnectionEvent::Message { payload } => {
                    messages += 1;
                    handler.on_message(payload).await;
                }
                ConnectionEvent::Closed { frame } => {
                    handler.on_close(frame.as_ref()).await;
                    close_frame = frame;
                }
            }
        }

        ConnectionSummary {
            opened: self.lifecycle.opened_at().is_some(),
            subprotocol: self.subprotocol.take(),
            messages,
            frame: close_frame,
        }
    }

    /// Apply an event from the handshake task to the lifecycle.
    ///
    /// Returns the event if it may be delivered in the current state.
    fn accept(&mut self, event: ConnectionEvent) -> Option<ConnectionEvent> {
        match &event {
            ConnectionEvent::Opened { subprotocol } => {
                // The handshake task has already rejected unoffered names
                if !self.lifecycle.set_open() {
                    return None;
                }
                self.subprotocol = subprotocol.clone();
            }
            ConnectionEvent::Message { .. } => {
                if !self.lifecycle.is_open() {
                    warn!(connection_id = %self.id, state = %self.state(), "Dropping message outside open state");
                    return None;
                }
            }
            ConnectionEvent::Closed { frame } => {
                let reason = frame
                    .as_ref()
                    .map(|f| format!("Close frame {}: {}", f.code, f.reason));
                self.lifecycle.set_closed(reason);
                self.finished = true;
                self.events.close();
            }
        }

        Some(event)
    }
}

impl Stream for Connection {
    type Item = ConnectionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            // A vanished handshake task still owes the owner a terminal event
            let event = ready!(this.events.poll_recv(cx))
                .unwrap_or(ConnectionEvent::Closed { frame: None });

            if let Some(event) = this.accept(event) {
                return Poll::Ready(Some(event));
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("candidates", &self.candidates)
            .field("subprotocol", &self.subprotocol)
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for Connection
pub struct ConnectionBuilder {
    target: String,
    candidates: SubprotocolList,
    connect_timeout: Duration,
    event_buffer: usize,
}

impl ConnectionBuilder {
    pub fn new(target: &str, candidates: SubprotocolList) -> Self {
        Self {
            target: target.to_string(),
            candidates,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Build from the `[endpoint]` section of the configuration
    pub fn from_config(config: &EndpointConfig) -> Result<Self, ConstructionError> {
        let candidates = SubprotocolList::new(config.subprotocols.iter().cloned())?;
        Ok(Self::new(&config.url, candidates)
            .connect_timeout(config.connect_timeout())
            .event_buffer(config.event_buffer))
    }

    /// Upper bound on the handshake, including TCP and TLS setup
    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Events the handshake task may queue before waiting for the owner
    pub fn event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    /// Validate and start the handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<Connection, ConstructionError> {
        if self.target.trim().is_empty() {
            return Err(ConstructionError::EmptyTarget);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| ConstructionError::NoRuntime)?;

        let id = Uuid::new_v4();
        let (event_tx, event_rx) = mpsc::channel(self.event_buffer);

        info!(
            connection_id = %id,
            url = %self.target,
            subprotocols = %self.candidates,
            "Connecting to peer"
        );

        let handshake = HandshakeTask {
            id,
            target: self.target.clone(),
            candidates: self.candidates.clone(),
            connect_timeout: self.connect_timeout,
            events: event_tx,
        };
        runtime.spawn(handshake.run());

        Ok(Connection {
            id,
            target: self.target,
            candidates: self.candidates,
            subprotocol: None,
            lifecycle: Lifecycle::new(id),
            events: event_rx,
            finished: false,
        })
    }
}

/// Background task that owns the socket for one connection
struct HandshakeTask {
    id: Uuid,
    target: String,
    candidates: SubprotocolList,
    connect_timeout: Duration,
    events: mpsc::Sender<ConnectionEvent>,
}

impl HandshakeTask {
    async fn run(self) {
        let handshake = tokio::select! {
            result = self.handshake() => result,
            _ = self.events.closed() => {
                debug!(connection_id = %self.id, "Connection dropped during handshake");
                return;
            }
        };

        let frame = match handshake {
            Ok((mut stream, subprotocol)) => {
                info!(
                    connection_id = %self.id,
                    subprotocol = ?subprotocol,
                    "WebSocket connection established"
                );
                let opened = ConnectionEvent::Opened { subprotocol };
                if self.events.send(opened).await.is_err() {
                    let _ = stream.close(None).await;
                    return;
                }
                self.read_loop(stream).await
            }
            Err(e) => {
                warn!(connection_id = %self.id, url = %self.target, error = %e, "Handshake failed");
                None
            }
        };

        let _ = self.events.send(ConnectionEvent::Closed { frame }).await;
    }

    /// Connect, offer the candidates and check the peer's selection
    async fn handshake(&self) -> Result<(WsStream, Option<String>)> {
        let mut request = self
            .target
            .as_str()
            .into_client_request()
            .context("Invalid target address")?;
        let offered = HeaderValue::from_str(&self.candidates.header_value())
            .context("Invalid subprotocol header")?;
        request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, offered);

        let (mut stream, response) = timeout(self.connect_timeout, connect_async(request))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to WebSocket")?;

        match self.selected_subprotocol(&response) {
            Ok(subprotocol) => Ok((stream, subprotocol)),
            Err(e) => {
                let _ = stream.close(None).await;
                Err(e)
            }
        }
    }

    fn selected_subprotocol<T>(&self, response: &Response<T>) -> Result<Option<String>> {
        let Some(value) = response.headers().get(SEC_WEBSOCKET_PROTOCOL) else {
            return Ok(None);
        };

        let name = value
            .to_str()
            .context("Selected subprotocol is not valid text")?
            .trim();
        if !self.candidates.contains(name) {
            bail!("Peer selected a subprotocol that was not offered: {}", name);
        }

        Ok(Some(name.to_string()))
    }

    /// Forward data frames until the connection ends; returns the peer's
    /// close frame if one arrived
    async fn read_loop(&self, stream: WsStream) -> Option<CloseFrame> {
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let payload = match msg {
                        Some(Ok(Message::Text(text))) => Payload::Text(text),
                        Some(Ok(Message::Binary(data))) => Payload::Binary(data),
                        Some(Ok(Message::Ping(_))) => {
                            debug!(connection_id = %self.id, "Received ping");
                            continue;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!(connection_id = %self.id, "Received pong");
                            continue;
                        }
                        Some(Ok(Message::Frame(_))) => continue,
                        Some(Ok(Message::Close(frame))) => {
                            info!(connection_id = %self.id, ?frame, "Received close frame");
                            // Flushes the close reply queued by the transport
                            let _ = write.close().await;
                            return frame.map(CloseFrame::from);
                        }
                        Some(Err(e)) => {
                            warn!(connection_id = %self.id, error = %e, "WebSocket error");
                            return None;
                        }
                        None => {
                            info!(connection_id = %self.id, "WebSocket stream ended");
                            return None;
                        }
                    };

                    if self.events.send(ConnectionEvent::Message { payload }).await.is_err() {
                        debug!(connection_id = %self.id, "Connection dropped, closing socket");
                        let _ = write.close().await;
                        return None;
                    }
                }

                _ = self.events.closed() => {
                    debug!(connection_id = %self.id, "Connection dropped, closing socket");
                    let _ = write.close().await;
                    return None;
                }
            }
        }
    }
}
