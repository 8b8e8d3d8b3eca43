//! Rinq Client Library
//!
//! This crate provides a WebSocket client endpoint that negotiates the Rinq
//! subprotocol (`rinq-1.0+cbor` or `rinq-1.0+json`) with a single peer and
//! surfaces the connection lifecycle as opened, message and closed events.

pub mod cli;
pub mod connection;

// Re-exports for convenience
pub use cli::config::Config;
pub use connection::error::ConstructionError;
pub use connection::event::{CloseFrame, ConnectionEvent, Payload};
pub use connection::handler::{ConnectionHandler, ConnectionSummary};
pub use connection::state::{ConnectionState, Lifecycle};
pub use connection::subprotocol::{Encoding, SubprotocolList, RINQ_CBOR, RINQ_JSON};
pub use connection::websocket::{Connection, ConnectionBuilder};
