//! Connection Handler
//!
//! Callback-style observer for applications that prefer `on_open` /
//! `on_message` / `on_close` over pulling events.

use async_trait::async_trait;

use crate::connection::event::{CloseFrame, Payload};

/// Receives the lifecycle notifications of one connection.
///
/// Driven by [`Connection::dispatch`](crate::Connection::dispatch).
/// `on_open` is called at most once and before any `on_message`;
/// `on_close` is called exactly once and nothing follows it.
#[async_trait]
pub trait ConnectionHandler: Send {
    /// Handshake succeeded with the given subprotocol
    async fn on_open(&mut self, subprotocol: Option<&str>);

    /// A payload arrived, in transport order
    async fn on_message(&mut self, payload: Payload);

    /// The connection finished, with the peer's close frame if one arrived
    async fn on_close(&mut self, frame: Option<&CloseFrame>);
}

/// Outcome of a dispatched connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// Whether the handshake ever completed
    pub opened: bool,
    pub subprotocol: Option<String>,
    pub messages: u64,
    pub frame: Option<CloseFrame>,
}
