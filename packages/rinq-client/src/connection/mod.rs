//! Connection module
//!
//! This module handles the WebSocket connection to the peer, including
//! subprotocol negotiation and lifecycle event delivery.

pub mod error;
pub mod event;
pub mod handler;
pub mod state;
pub mod subprotocol;
pub mod websocket;
