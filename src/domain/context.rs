// src/domain/context.rs

//! Execution context identity.
//!
//! Every endpoint is bound to exactly one context, either the hub or a named
//! peer. The identity is passed in explicitly when the transport is created;
//! nothing in the crate looks up a "current" context implicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a peer context (for example a worker process or a window).
///
/// Cheap to clone. Peer ids are embedded into channel names, so they should
/// be short and stable for the lifetime of the peer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub Arc<str>);

impl PeerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for PeerId
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        PeerId(value.into())
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An execution context attached to a transport.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContextId {
    /// The single coordinating context.
    Hub,

    /// A peer context.
    Peer(PeerId),
}

impl ContextId {
    /// Shorthand for `ContextId::Peer(id.into())`.
    pub fn peer(id: impl Into<PeerId>) -> Self {
        ContextId::Peer(id.into())
    }

    pub fn is_hub(&self) -> bool {
        matches!(self, ContextId::Hub)
    }

    /// The peer id, or `None` for the hub.
    pub fn peer_id(&self) -> Option<&PeerId> {
        match self {
            ContextId::Hub => None,
            ContextId::Peer(id) => Some(id),
        }
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Hub => f.write_str("hub"),
            ContextId::Peer(id) => write!(f, "peer:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_distinguishes_hub_and_peers() {
        assert_eq!(ContextId::Hub.to_string(), "hub");
        assert_eq!(ContextId::peer("w1").to_string(), "peer:w1");
    }

    #[test]
    fn peer_id_accessor() {
        assert!(ContextId::Hub.peer_id().is_none());
        assert_eq!(
            ContextId::peer("w7").peer_id(),
            Some(&PeerId::from("w7"))
        );
    }
}
