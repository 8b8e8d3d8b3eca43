//! Connection Lifecycle
//!
//! The connection state machine and the transition history kept for it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Handshake succeeded; messages may arrive
    Open,
    /// Terminal. No further events.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// State transition information
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Owned lifecycle tracker for a single connection.
///
/// The history holds at most two transitions since every edge is forward.
#[derive(Debug)]
pub struct Lifecycle {
    connection_id: Uuid,
    current: ConnectionState,
    created_at: DateTime<Utc>,
    opened_at: Option<DateTime<Utc>>,
    transitions: Vec<StateTransition>,
}

impl Lifecycle {
    /// Create a tracker starting in `Connecting`
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            current: ConnectionState::Connecting,
            created_at: Utc::now(),
            opened_at: None,
            transitions: Vec::new(),
        }
    }

    pub fn current_state(&self) -> ConnectionState {
        self.current
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the handshake completed, if it did
    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    /// Transition to a new state. Returns false for an illegal edge.
    pub fn transition_to(&mut self, new_state: ConnectionState, reason: Option<String>) -> bool {
        if !Self::is_valid_transition(self.current, new_state) {
            tracing::warn!(
                connection_id = %self.connection_id,
                from = %self.current,
                to = %new_state,
                "Rejected connection state transition"
            );
            return false;
        }

        let now = Utc::now();
        let old_state = self.current;
        self.current = new_state;

        if new_state == ConnectionState::Open {
            self.opened_at = Some(now);
        }

        self.transitions.push(StateTransition {
            from: old_state,
            to: new_state,
            timestamp: now,
            reason,
        });

        tracing::info!(
            connection_id = %self.connection_id,
            from = %old_state,
            to = %new_state,
            "Connection state transition"
        );

        true
    }

    /// Only forward edges exist; nothing leaves `Closed`
    fn is_valid_transition(from: ConnectionState, to: ConnectionState) -> bool {
        matches!(
            (from, to),
            (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closed)
        )
    }

    /// Mark the handshake as complete
    pub fn set_open(&mut self) -> bool {
        self.transition_to(ConnectionState::Open, Some("Handshake complete".to_string()))
    }

    /// Mark the connection as finished
    pub fn set_closed(&mut self, reason: Option<String>) -> bool {
        self.transition_to(ConnectionState::Closed, reason)
    }

    /// Get recent state transitions, newest first
    pub fn recent_transitions(&self, count: usize) -> Vec<StateTransition> {
        self.transitions.iter().rev().take(count).cloned().collect()
    }

    pub fn is_open(&self) -> bool {
        self.current == ConnectionState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.current == ConnectionState::Closed
    }
}
