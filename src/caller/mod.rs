// src/caller/mod.rs
//! Caller half of the endpoint.
//!
//! # Architecture
//!
//! Every call derives a fresh channel triple, registers a [`PendingCall`]
//! (one once-listener each on the data and error channels), and only then
//! sends the [`CallEnvelope`] on the stable send channel. The first reply on
//! either channel settles the call; the pending state is dropped before the
//! result is handed back, which deregisters both listeners.
//!
//! # Limitations
//!
//! There is no timeout. A call to an operation nobody answers stays pending
//! until the caller drops the future or the transport is closed. Wrap the
//! call in `tokio::time::timeout` if the application needs a bound; dropping
//! the future releases its listeners.

mod pending;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pending::{PendingCall, Reply};

use crate::peer::{self, Route};
use crate::{
    // ---
    log_debug,
    log_trace,
    Args,
    CallEnvelope,
    Envelope,
    PeerId,
    Result,
    RpcEndpoint,
    RpcError,
};

impl RpcEndpoint {
    // ---
    /// Call an operation answered by the hub.
    ///
    /// `args` is spread into positional arguments: a tuple `(a, b)` becomes
    /// two arguments, `()` becomes none, any other value becomes one.
    ///
    /// # Errors
    ///
    /// - `RpcError::Remote` - the handler failed; carries the decoded error
    /// - `RpcError::Serialization` - arguments or the reply could not be (de)serialized
    /// - `RpcError::Transport` - the request could not be sent
    /// - `RpcError::TransportClosed` - the transport closed before a reply arrived
    pub async fn call<A, R>(&self, operation: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let route = peer::route_to_hub(&self.inner.namer, operation);
        self.call_route(operation, route, args).await
    }

    /// Call an operation answered by a specific peer.
    ///
    /// Identical to [`call`](Self::call) except that the channels are scoped
    /// by `peer` and the request is delivered to that peer only. If the peer
    /// goes away before replying, the call stays pending (see module docs).
    pub async fn call_peer<A, R>(&self, peer: &PeerId, operation: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let route = peer::route_to_peer(&self.inner.namer, peer, operation);
        self.call_route(operation, route, args).await
    }

    async fn call_route<A, R>(&self, operation: &str, route: Route, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // ---
        let Route {
            triple,
            destination,
        } = route;

        // Serialize before registering anything, so a bad argument never
        // leaves listeners behind.
        let call = CallEnvelope {
            data_channel: triple.data.clone(),
            error_channel: triple.error.clone(),
            user_args: Args::from_serialize(args)?.into_inner(),
        };
        let payload = Bytes::from(serde_json::to_vec(&call)?);

        let transport = self.inner.transport.as_ref();
        let pending = PendingCall::register(transport, &triple).await?;

        let env = Envelope::new(triple.send.clone(), self.context_id().clone(), payload)
            .to(destination)
            .with_content_type(self.inner.config.content_type.clone());

        log_trace!("{}: call {operation} via {}", self.context_id(), triple.send);
        transport.send(env).await?;

        match pending.settle().await {
            Reply::Data(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Reply::Error(bytes) => {
                let remote = self.inner.codec.decode(&bytes)?;
                log_debug!("{}: call {operation} failed remotely: {remote}", self.context_id());
                Err(RpcError::Remote(remote))
            }
            Reply::Closed => Err(RpcError::TransportClosed),
        }
    }
}
