//! Connection Errors
//!
//! Only construction can fail synchronously. Everything that goes wrong
//! after the handshake task starts is reported as a `Closed` event.

use thiserror::Error;

/// Invalid arguments passed when creating a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("target address is empty")]
    EmptyTarget,

    #[error("at least one subprotocol candidate is required")]
    NoCandidates,

    #[error("subprotocol candidate offered more than once: {0}")]
    DuplicateCandidate(String),

    #[error("invalid subprotocol candidate: {0:?}")]
    InvalidCandidate(String),

    #[error("connection must be created inside a tokio runtime")]
    NoRuntime,
}
