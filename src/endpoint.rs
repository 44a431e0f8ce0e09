//! RPC endpoint.
//!
//! An [`RpcEndpoint`] binds the correlation layer to one context's transport
//! attachment. The same type serves both roles: it can issue calls
//! ([`call`](RpcEndpoint::call), [`call_peer`](RpcEndpoint::call_peer)) and
//! answer them ([`answer`](RpcEndpoint::answer),
//! [`answer_peer`](RpcEndpoint::answer_peer)). The caller and answerer
//! halves live in `src/caller/` and `src/answerer/`.

use std::sync::Arc;

use crate::{
    // ---
    ChannelNamer,
    ContextId,
    ErrorCodec,
    Result,
    RpcConfig,
    RpcEndpointBuilder,
    TransportPtr,
};

/// Correlated call/answer endpoint for one context.
///
/// Cheap to clone (internally `Arc`-backed).
///
/// # Example
///
/// ```
/// # use chanrpc::{MemoryBus, RemoteError, RpcEndpoint, TransportConfig};
/// # async fn example() -> chanrpc::Result<()> {
/// let bus = MemoryBus::new();
/// let hub = RpcEndpoint::new(
///     chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), bus.clone()).await?,
/// );
/// let peer = RpcEndpoint::new(
///     chanrpc::create_memory_transport_with_bus(TransportConfig::peer("w1"), bus).await?,
/// );
///
/// let _answer = hub
///     .answer("add", |(a, b): (i64, i64)| async move { Ok::<_, RemoteError>(a + b) })
///     .await?;
///
/// let sum: i64 = peer.call("add", &(2, 3)).await?;
/// assert_eq!(sum, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcEndpoint {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    // ---
    pub(crate) transport: TransportPtr,
    pub(crate) namer: ChannelNamer,
    pub(crate) config: RpcConfig,
    pub(crate) codec: Arc<dyn ErrorCodec>,
}

impl RpcEndpoint {
    /// Create an endpoint with the default configuration and JSON error codec.
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self::from_parts(
            transport,
            RpcConfig::default(),
            Arc::new(crate::JsonErrorCodec),
        )
    }

    /// Start configuring an endpoint.
    pub fn builder(transport: TransportPtr) -> RpcEndpointBuilder {
        RpcEndpointBuilder::new(transport)
    }

    pub(crate) fn from_parts(
        transport: TransportPtr,
        config: RpcConfig,
        codec: Arc<dyn ErrorCodec>,
    ) -> Self {
        // ---
        let namer = ChannelNamer::new(config.channel_prefix.clone());

        Self {
            inner: Arc::new(Inner {
                transport,
                namer,
                config,
                codec,
            }),
        }
    }

    /// Identity of the context this endpoint belongs to.
    pub fn context_id(&self) -> &ContextId {
        self.inner.transport.context_id()
    }

    /// The underlying transport.
    pub fn transport(&self) -> &TransportPtr {
        &self.inner.transport
    }

    /// The channel namer, for inspecting derived channel names.
    pub fn channel_namer(&self) -> &ChannelNamer {
        &self.inner.namer
    }

    /// Detach this endpoint's context from the transport.
    ///
    /// Pending calls fail with [`RpcError::TransportClosed`](crate::RpcError::TransportClosed), answerers stop,
    /// and peers see this context as no longer alive.
    pub async fn close(&self) -> Result<()> {
        // ---
        crate::log_debug!("{}: closing endpoint", self.context_id());
        self.inner.transport.close().await
    }
}
