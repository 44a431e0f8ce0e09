//! Peer addressing.
//!
//! Decides where a call goes and whether a reply may be sent:
//!
//! - hub-addressed calls use the plain send channel and target
//!   [`ContextId::Hub`];
//! - peer-addressed calls scope every channel by the peer id and target
//!   [`ContextId::Peer`];
//! - peer answerers check that the originator is still attached before
//!   replying. A reply to a context that has gone away is dropped: the
//!   caller no longer exists to observe it, and the answerer sees
//!   [`RpcError::DeadPeer`] only for logging and counting.

use crate::{ChannelNamer, ChannelTriple, ContextId, PeerId, Result, RpcError, Transport};

/// Channels and destination for one call.
#[derive(Clone, Debug)]
pub(crate) struct Route {
    pub(crate) triple: ChannelTriple,
    pub(crate) destination: ContextId,
}

pub(crate) fn route_to_hub(namer: &ChannelNamer, operation: &str) -> Route {
    Route {
        triple: namer.derive(operation, None),
        destination: ContextId::Hub,
    }
}

pub(crate) fn route_to_peer(namer: &ChannelNamer, peer: &PeerId, operation: &str) -> Route {
    Route {
        triple: namer.derive(operation, Some(peer)),
        destination: ContextId::Peer(peer.clone()),
    }
}

/// Whether replies are guarded by a liveness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReplyPolicy {
    /// Reply unconditionally (hub answerers).
    Unchecked,

    /// Drop replies whose originator is no longer attached (peer answerers).
    RequireLivePeer,
}

pub(crate) fn guard_reply(
    transport: &dyn Transport,
    policy: ReplyPolicy,
    target: &ContextId,
) -> Result<()> {
    // ---
    match policy {
        ReplyPolicy::Unchecked => Ok(()),
        ReplyPolicy::RequireLivePeer if transport.is_alive(target) => Ok(()),
        ReplyPolicy::RequireLivePeer => Err(RpcError::DeadPeer(target.clone())),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{create_memory_transport_with_bus, MemoryBus, TransportConfig};

    #[test]
    fn routes_pick_destination_and_scope() {
        // ---
        let namer = ChannelNamer::default();

        let hub = route_to_hub(&namer, "save");
        assert_eq!(hub.destination, ContextId::Hub);
        assert_eq!(hub.triple.send, namer.send_channel("save", None));

        let peer = PeerId::from("w9");
        let to_peer = route_to_peer(&namer, &peer, "save");
        assert_eq!(to_peer.destination, ContextId::Peer(peer.clone()));
        assert_eq!(to_peer.triple.send, namer.send_channel("save", Some(&peer)));
    }

    #[tokio::test]
    async fn guard_drops_replies_to_detached_contexts() {
        // ---
        let bus = MemoryBus::new();
        let w1 = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
            .await
            .unwrap();
        let w2 = create_memory_transport_with_bus(TransportConfig::peer("w2"), bus)
            .await
            .unwrap();

        let target = ContextId::peer("w2");
        guard_reply(w1.as_ref(), ReplyPolicy::RequireLivePeer, &target).unwrap();

        w2.close().await.unwrap();

        assert!(matches!(
            guard_reply(w1.as_ref(), ReplyPolicy::RequireLivePeer, &target),
            Err(RpcError::DeadPeer(ctx)) if ctx == target
        ));
        guard_reply(w1.as_ref(), ReplyPolicy::Unchecked, &target).unwrap();
    }
}
