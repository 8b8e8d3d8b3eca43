//! Subprotocol Candidates
//!
//! The ordered list of subprotocol names a client offers during the
//! handshake, and the encoding each Rinq subprotocol name selects.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::connection::error::ConstructionError;

/// Common prefix of every Rinq 1.0 subprotocol name
pub const RINQ_PREFIX: &str = "rinq-1.0+";

/// CBOR-encoded Rinq 1.0
pub const RINQ_CBOR: &str = "rinq-1.0+cbor";

/// JSON-encoded Rinq 1.0
pub const RINQ_JSON: &str = "rinq-1.0+json";

/// Ordered, duplicate-free list of offered subprotocol names.
///
/// The first entry is the most preferred. The list is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprotocolList {
    names: Vec<String>,
}

impl SubprotocolList {
    /// Validate and build a candidate list
    pub fn new<I, S>(names: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(ConstructionError::NoCandidates);
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !is_token(name) {
                return Err(ConstructionError::InvalidCandidate(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConstructionError::DuplicateCandidate(name.clone()));
            }
        }

        Ok(Self { names })
    }

    /// The Rinq 1.0 candidates, CBOR preferred over JSON
    pub fn rinq() -> Self {
        Self {
            names: vec![RINQ_CBOR.to_string(), RINQ_JSON.to_string()],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// A validated list is never empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The most preferred candidate
    pub fn preferred(&self) -> &str {
        &self.names[0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Value of the `Sec-WebSocket-Protocol` request header, in offer order
    pub fn header_value(&self) -> String {
        self.names.join(", ")
    }
}

impl Default for SubprotocolList {
    fn default() -> Self {
        Self::rinq()
    }
}

impl std::fmt::Display for SubprotocolList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.header_value())
    }
}

/// RFC 7230 `token`: the grammar a subprotocol name must follow
fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

/// Message encoding implied by a negotiated subprotocol.
///
/// Used as the routing key for whatever decodes `Message` payloads
/// downstream; this crate never decodes them itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Cbor,
    Json,
}

impl Encoding {
    /// Map a negotiated subprotocol name to its encoding
    pub fn from_subprotocol(name: &str) -> Option<Self> {
        match name.strip_prefix(RINQ_PREFIX)? {
            "cbor" => Some(Encoding::Cbor),
            "json" => Some(Encoding::Json),
            _ => None,
        }
    }

    /// The subprotocol name that selects this encoding
    pub fn subprotocol(&self) -> &'static str {
        match self {
            Encoding::Cbor => RINQ_CBOR,
            Encoding::Json => RINQ_JSON,
        }
    }

    /// Whether payloads arrive as binary frames
    pub fn is_binary(&self) -> bool {
        matches!(self, Encoding::Cbor)
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cbor => write!(f, "cbor"),
            Encoding::Json => write!(f, "json"),
        }
    }
}
