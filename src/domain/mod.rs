//! Domain layer public interface.
//!
//! This module defines domain-level abstractions that are independent of
//! transport implementations and of the correlation protocol.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod context;
mod transport;

pub use context::{ContextId, PeerId};

pub(crate) use transport::{lock_ignore_poison, Claim};

pub use transport::{
    //
    Channel,
    Envelope,
    OnceSubscription,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};
