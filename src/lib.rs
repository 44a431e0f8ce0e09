//! Correlated request/reply RPC over one-way named-channel transports.
//!
//! The underlying transport only knows how to fire a payload at a named
//! channel. This crate layers call/answer semantics on top: a caller invokes
//! a named operation with arguments and receives exactly one correlated
//! result or error, whether the operation is answered by the hub context or
//! by a specific peer.
//!
//! Correlation is done entirely through channel names. Each call derives a
//! stable send channel (shared by all calls to the operation) and a fresh
//! pair of reply channels that only this call listens on. Listener
//! registration is scoped: a call's reply listeners are released on every
//! exit path, and an answerer's subscription is released when its
//! [`AnswerHandle`] is disposed or dropped.
//!
//! # Limitations
//!
//! One request, one response. No timeouts, cancellation, streaming or
//! discovery: a call nobody answers stays pending until it is dropped or
//! the transport closes.

// Import all sub modules once...
mod answerer;
mod caller;
mod domain;
mod peer;
mod protocol;
mod transport;

mod endpoint;
mod endpoint_builder;
mod rpc_config;

mod channels;
mod codec;
mod correlation;
mod error;
mod macros;

pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

// Re-export main types
pub use answerer::AnswerHandle;
pub use endpoint::RpcEndpoint;
pub use endpoint_builder::RpcEndpointBuilder;

pub use rpc_config::{RpcConfig, DEFAULT_CHANNEL_PREFIX, DEFAULT_CONTENT_TYPE};

pub use channels::{ChannelNamer, ChannelTriple};
pub use codec::{
    ErrorCodec, JsonErrorCodec, RemoteError, BAD_ARGUMENTS_KIND, BAD_RESULT_KIND, PANIC_KIND,
};
pub use correlation::CorrelationId;
pub use error::{Result, RpcError};
pub use protocol::{Args, CallEnvelope};

pub use transport::{create_memory_transport, create_memory_transport_with_bus, MemoryBus};

// --- public re-exports
pub use domain::{
    //
    Channel,
    ContextId,
    Envelope,
    OnceSubscription,
    PeerId,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};
