// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the narrow interface the correlation layer consumes
//! from its environment: a one-way, named-channel messaging primitive that
//! connects isolated contexts. It intentionally avoids any reference to
//! concrete IPC mechanisms.
//!
//! The transport is responsible only for delivering opaque envelopes to
//! subscribed listeners. It has no notion of a request having a matching
//! response; correlation is built on top by the caller and answerer layers.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::{ContextId, Result, RpcError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::sync::mpsc;

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The maps guarded this way hold no invariants spanning multiple fields;
/// the worst outcome of a poisoned lock is a stale entry.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Ownership token for an answered send channel.
///
/// Releasing with a stale token is a no-op, so a registration that already
/// ended can never free a channel someone else has since claimed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Claim(u64);

/// Shared base state for all transport implementations.
///
/// Each concrete transport embeds this as a field named `base` so that the
/// default `Transport` methods can delegate to it. One base exists per
/// context attachment, so state kept here is shared by every endpoint
/// built on the same transport.
pub struct TransportBase {
    /// Identity of the context this transport handle belongs to.
    pub context_id: ContextId,

    /// Send channels this context currently answers on.
    answered: Mutex<HashMap<Channel, Claim>>,
    next_claim: AtomicU64,
}

impl TransportBase {
    /// Reserve a send channel for a new answerer of this context.
    pub(crate) fn claim(&self, channel: &Channel) -> Result<Claim> {
        // ---
        let mut answered = lock_ignore_poison(&self.answered);
        if answered.contains_key(channel) {
            return Err(RpcError::AlreadyAnswered(channel.to_string()));
        }
        let claim = Claim(self.next_claim.fetch_add(1, Ordering::Relaxed));
        answered.insert(channel.clone(), claim);
        Ok(claim)
    }

    /// Give a channel back. Only the current holder's token releases it.
    pub(crate) fn release(&self, channel: &Channel, claim: Claim) {
        // ---
        let mut answered = lock_ignore_poison(&self.answered);
        if answered.get(channel) == Some(&claim) {
            answered.remove(channel);
        }
    }
}

impl From<&TransportConfig> for TransportBase {
    fn from(config: &TransportConfig) -> Self {
        Self {
            context_id: config.context.clone(),
            answered: Mutex::new(HashMap::new()),
            next_claim: AtomicU64::new(1),
        }
    }
}

/// Configuration for creating a transport instance.
///
/// Passed to transport factory functions (`create_*_transport()`).
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Context the transport is attached as.
    pub context: ContextId,
}

impl TransportConfig {
    /// Attach as the hub context.
    pub fn hub() -> Self {
        Self {
            context: ContextId::Hub,
        }
    }

    /// Attach as the peer with the given id.
    pub fn peer(id: impl Into<crate::PeerId>) -> Self {
        Self {
            context: ContextId::peer(id),
        }
    }
}

/// A named transport channel.
///
/// Channel names are opaque at the domain level; matching is exact string
/// equality. Immutable and cheap to clone.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(pub Arc<str>);

impl Channel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Channel
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Channel(value.into())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque message envelope, the unit of delivery.
///
/// The transport does not interpret `payload`; it only uses `channel` and
/// `destination` for routing.
///
/// # Example
///
/// ```
/// # use chanrpc::{Channel, ContextId, Envelope};
/// # use bytes::Bytes;
/// let env = Envelope::new(
///     Channel::from("jobs"),
///     ContextId::peer("w1"),
///     Bytes::from_static(b"{}"),
/// )
/// .to(ContextId::Hub);
/// assert_eq!(env.destination, Some(ContextId::Hub));
/// ```
#[derive(Clone, Debug)]
pub struct Envelope {
    // ---
    /// Channel the envelope is sent on.
    pub channel: Channel,

    /// Context that sent the envelope. Replies are addressed here.
    pub sender: ContextId,

    /// Target context, or `None` to broadcast to every listener of `channel`.
    pub destination: Option<ContextId>,

    /// Opaque payload bytes.
    pub payload: Bytes,

    /// Optional content type metadata (e.g., "application/json").
    ///
    /// Informational only; not enforced by the transport.
    pub content_type: Option<Arc<str>>,
}

impl Envelope {
    /// Create a broadcast envelope.
    pub fn new(channel: Channel, sender: ContextId, payload: Bytes) -> Self {
        // ---
        Self {
            channel,
            sender,
            destination: None,
            payload,
            content_type: None,
        }
    }

    /// Address the envelope to a single context.
    pub fn to(mut self, destination: ContextId) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Attach content type metadata.
    pub fn with_content_type(mut self, content_type: Arc<str>) -> Self {
        self.content_type = Some(content_type);
        self
    }
}

/// Identifier of one registered listener, unique per transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

type Release = Box<dyn FnOnce() + Send>;

/// Handle returned from a successful subscription.
///
/// The listener stays registered until either:
/// - the handle is dropped,
/// - `Transport::unsubscribe` is called with its id, or
/// - the transport is closed.
///
/// Dropping the handle deregisters the listener synchronously, so a listener
/// can never outlive the code that owns it.
pub struct SubscriptionHandle {
    // ---
    channel: Channel,
    id: SubscriptionId,

    /// Receiver for delivered envelopes.
    pub inbox: mpsc::UnboundedReceiver<Envelope>,

    release: Option<Release>,
}

impl SubscriptionHandle {
    /// Build a handle. `release` runs exactly once, when the handle is dropped.
    pub fn new(
        channel: Channel,
        id: SubscriptionId,
        inbox: mpsc::UnboundedReceiver<Envelope>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel,
            id,
            inbox,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next envelope; `None` once the listener has been removed
    /// and every already-delivered envelope has been drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.inbox.recv().await
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish()
    }
}

/// A listener that accepts at most one envelope.
///
/// `recv` consumes the subscription: the listener is deregistered as soon as
/// the first envelope is taken (or the future is dropped).
#[derive(Debug)]
pub struct OnceSubscription {
    handle: SubscriptionHandle,
}

impl OnceSubscription {
    pub fn channel(&self) -> &Channel {
        self.handle.channel()
    }

    pub async fn recv(mut self) -> Option<Envelope> {
        // `self` (and with it the listener) is dropped on return.
        self.handle.recv().await
    }
}

impl From<SubscriptionHandle> for OnceSubscription {
    fn from(handle: SubscriptionHandle) -> Self {
        Self { handle }
    }
}

/// Transport abstraction.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns, envelopes sent *after* that point on the
///   same channel are deliverable to the returned handle.
/// - `send()` is fire-and-forget: it does not wait for listeners and sending
///   to a channel nobody listens on is not an error.
/// - `unsubscribe()` takes effect before it returns; envelopes already
///   delivered to the handle's inbox stay there.
/// - After `close()`, `is_alive()` reports the context as gone on every
///   transport attached to the same fabric.
///
/// The in-memory transport serves as the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat the async methods
/// as normal `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &TransportBase;

    /// Identity of the local context.
    fn context_id(&self) -> &ContextId {
        &self.base().context_id
    }

    /// Send an envelope. Delivered to listeners of `env.channel` owned by
    /// `env.destination`, or to all listeners when the destination is `None`.
    async fn send(&self, env: Envelope) -> Result<()>;

    /// Register a persistent listener for a channel.
    async fn subscribe(&self, channel: Channel) -> Result<SubscriptionHandle>;

    /// Register a listener that is removed after its first delivery.
    async fn subscribe_once(&self, channel: Channel) -> Result<OnceSubscription> {
        Ok(self.subscribe(channel).await?.into())
    }

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, channel: &Channel, id: SubscriptionId);

    /// Number of listeners currently registered on a channel, across all
    /// contexts attached to the same fabric.
    fn listener_count(&self, channel: &Channel) -> usize;

    /// Whether the given context is still attached.
    fn is_alive(&self, context: &ContextId) -> bool;

    /// Detach the local context and drop all of its listeners.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// `.clone()` is cheap; clones share the same underlying attachment.
pub type TransportPtr = Arc<dyn Transport>;
