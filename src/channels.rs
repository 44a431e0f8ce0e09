//! Channel naming.
//!
//! Turns a logical operation name (and, for peer-addressed calls, the peer's
//! identity) into the three transport channels a call uses:
//!
//! ```text
//! send   {prefix}-send-channel-[{peer}-]{op}
//! data   {prefix}-response-data-channel-[{peer}-]{op}-{token}
//! error  {prefix}-response-error-channel-[{peer}-]{op}-{token}
//! ```
//!
//! `send` is stable so that an answerer subscribes once and serves every
//! call. `data` and `error` embed a fresh [`CorrelationId`] per derivation,
//! which keeps concurrent calls to the same operation from observing each
//! other's replies.

use std::sync::Arc;

use crate::{Channel, CorrelationId, PeerId};

/// The channels used by a single call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelTriple {
    /// Stable per (operation, peer).
    pub send: Channel,
    /// Unique per call.
    pub data: Channel,
    /// Unique per call.
    pub error: Channel,
}

/// Derives channel names within a namespace.
#[derive(Clone, Debug)]
pub struct ChannelNamer {
    prefix: Arc<str>,
}

impl ChannelNamer {
    pub fn new(prefix: impl Into<Arc<str>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The stable channel answerers subscribe to.
    pub fn send_channel(&self, operation: &str, peer: Option<&PeerId>) -> Channel {
        Channel::from(format!(
            "{}-send-channel-{}",
            self.prefix,
            scoped(operation, peer)
        ))
    }

    /// Derive a fresh triple. Two derivations never share data/error channels.
    pub fn derive(&self, operation: &str, peer: Option<&PeerId>) -> ChannelTriple {
        // ---
        let token = CorrelationId::generate();
        let scope = scoped(operation, peer);

        ChannelTriple {
            send: self.send_channel(operation, peer),
            data: Channel::from(format!(
                "{}-response-data-channel-{scope}-{token}",
                self.prefix
            )),
            error: Channel::from(format!(
                "{}-response-error-channel-{scope}-{token}",
                self.prefix
            )),
        }
    }
}

impl Default for ChannelNamer {
    fn default() -> Self {
        Self::new(crate::rpc_config::DEFAULT_CHANNEL_PREFIX)
    }
}

fn scoped(operation: &str, peer: Option<&PeerId>) -> String {
    match peer {
        Some(peer) => format!("{peer}-{operation}"),
        None => operation.to_string(),
    }
}
