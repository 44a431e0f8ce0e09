//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended for testing, single-process
//! applications, and as the reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - Once `subscribe()` returns, envelopes sent *after* that point on the
//!   same channel are deliverable.
//! - Channel matching is exact string equality.
//! - An addressed envelope reaches only listeners owned by its destination
//!   context; an unaddressed one reaches every listener of the channel.
//! - `unsubscribe()` and handle drops remove the listener immediately.
//! - Closing a transport detaches its context: `is_alive()` turns false and
//!   every listener the context owned is removed.
//!
//! ## Non-Goals
//!
//! This transport does not emulate the failure modes, persistence, or
//! ordering guarantees of any specific IPC mechanism.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use tokio::sync::mpsc;

use crate::domain::lock_ignore_poison;

use crate::{
    // ---
    log_debug,
    log_info,
    log_trace,
    Channel,
    ContextId,
    Envelope,
    Result,
    RpcError,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

struct Listener {
    id: SubscriptionId,
    owner: ContextId,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Shared message fabric for the in-memory transport.
///
/// Every `MemoryTransport` attached to the same bus can exchange envelopes
/// with the others, the way separate processes would over a real IPC link.
///
/// Use one bus per test to keep parallel tests isolated:
///
/// ```
/// # use chanrpc::{MemoryBus, TransportConfig};
/// # async fn example() -> chanrpc::Result<()> {
/// let bus = MemoryBus::new();
/// let hub = chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), bus.clone()).await?;
/// let peer = chanrpc::create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone()).await?;
/// assert!(hub.is_alive(peer.context_id()));
/// # Ok(())
/// # }
/// ```
pub struct MemoryBus {
    // ---
    listeners: Mutex<HashMap<Channel, Vec<Listener>>>,
    contexts: Mutex<HashSet<ContextId>>,
    next_id: AtomicU64,
}

impl MemoryBus {
    /// Create a new, empty bus.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    fn attach(&self, context: &ContextId) -> Result<()> {
        // ---
        let mut contexts = lock_ignore_poison(&self.contexts);
        if !contexts.insert(context.clone()) {
            return Err(RpcError::Transport(format!(
                "context {context} is already attached to this bus"
            )));
        }
        log_info!("{context}: attached to memory bus");
        Ok(())
    }

    fn detach(&self, context: &ContextId) {
        // ---
        // Lock order is always `contexts` then `listeners`. Holding both
        // keeps a concurrent `register` from slipping a listener in after
        // the purge.
        let mut contexts = lock_ignore_poison(&self.contexts);
        contexts.remove(context);

        // Dropping the senders closes the inboxes of every listener the
        // context owned.
        let mut listeners = lock_ignore_poison(&self.listeners);
        for entries in listeners.values_mut() {
            entries.retain(|l| &l.owner != context);
        }
        listeners.retain(|_, entries| !entries.is_empty());
        drop(listeners);
        drop(contexts);

        log_debug!("{context}: detached from memory bus");
    }

    fn is_attached(&self, context: &ContextId) -> bool {
        lock_ignore_poison(&self.contexts).contains(context)
    }

    fn publish(&self, env: Envelope) {
        // ---
        // Collect senders first so the lock is not held while delivering.
        let targets: Vec<mpsc::UnboundedSender<Envelope>> = {
            let listeners = lock_ignore_poison(&self.listeners);
            match listeners.get(&env.channel) {
                Some(entries) => entries
                    .iter()
                    .filter(|l| match &env.destination {
                        Some(dest) => &l.owner == dest,
                        None => true,
                    })
                    .map(|l| l.tx.clone())
                    .collect(),
                None => Vec::new(),
            }
        };

        log_trace!(
            "{}: send on {} to {} listener(s)",
            env.sender,
            env.channel,
            targets.len()
        );

        for tx in targets {
            // A closed inbox means the handle is being dropped concurrently.
            let _ = tx.send(env.clone());
        }
    }

    fn register(self: &Arc<Self>, owner: &ContextId, channel: Channel) -> Result<SubscriptionHandle> {
        // ---
        // The attachment check and the insert share one critical section,
        // so a racing `detach` either sees this listener or rejects it.
        let contexts = lock_ignore_poison(&self.contexts);
        if !contexts.contains(owner) {
            return Err(RpcError::Transport(format!(
                "context {owner} is not attached; cannot subscribe to {channel}"
            )));
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        lock_ignore_poison(&self.listeners)
            .entry(channel.clone())
            .or_default()
            .push(Listener {
                id,
                owner: owner.clone(),
                tx,
            });
        drop(contexts);

        log_trace!("{owner}: subscribed to {channel} ({id:?})");

        let bus: Weak<MemoryBus> = Arc::downgrade(self);
        let release_channel = channel.clone();
        Ok(SubscriptionHandle::new(channel, id, rx, move || {
            if let Some(bus) = bus.upgrade() {
                bus.remove(&release_channel, id);
            }
        }))
    }

    fn remove(&self, channel: &Channel, id: SubscriptionId) {
        // ---
        let mut listeners = lock_ignore_poison(&self.listeners);
        if let Some(entries) = listeners.get_mut(channel) {
            entries.retain(|l| l.id != id);
            if entries.is_empty() {
                listeners.remove(channel);
            }
        }
    }

    fn count(&self, channel: &Channel) -> usize {
        lock_ignore_poison(&self.listeners)
            .get(channel)
            .map_or(0, Vec::len)
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        // ---
        Self {
            listeners: Mutex::new(HashMap::new()),
            contexts: Mutex::new(HashSet::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

/// Process-global bus used by [`create_memory_transport`].
static GLOBAL_BUS: OnceLock<Arc<MemoryBus>> = OnceLock::new();

fn global_bus() -> Arc<MemoryBus> {
    GLOBAL_BUS.get_or_init(MemoryBus::new).clone()
}

/// In-memory transport: one context's attachment to a [`MemoryBus`].
struct MemoryTransport {
    // ---
    base: TransportBase,
    bus: Arc<MemoryBus>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn base(&self) -> &TransportBase {
        &self.base
    }

    async fn send(&self, env: Envelope) -> Result<()> {
        // ---
        if !self.bus.is_attached(self.context_id()) {
            return Err(RpcError::Transport(format!(
                "context {} is closed; cannot send on {}",
                self.context_id(),
                env.channel
            )));
        }
        self.bus.publish(env);
        Ok(())
    }

    async fn subscribe(&self, channel: Channel) -> Result<SubscriptionHandle> {
        self.bus.register(self.context_id(), channel)
    }

    fn unsubscribe(&self, channel: &Channel, id: SubscriptionId) {
        self.bus.remove(channel, id);
    }

    fn listener_count(&self, channel: &Channel) -> usize {
        self.bus.count(channel)
    }

    fn is_alive(&self, context: &ContextId) -> bool {
        self.bus.is_attached(context)
    }

    /// Detach this context. Listeners owned by other contexts are untouched.
    async fn close(&self) -> Result<()> {
        self.bus.detach(self.context_id());
        Ok(())
    }
}

/// Create a new in-memory transport attached to the process-global bus.
///
/// For isolated parallel testing, use [`create_memory_transport_with_bus`].
///
/// # Errors
///
/// Returns `RpcError::Transport` if the context is already attached.
pub async fn create_memory_transport(config: TransportConfig) -> Result<TransportPtr> {
    // ---
    create_memory_transport_with_bus(config, global_bus()).await
}

/// Create a new in-memory transport attached to the given bus.
///
/// # Errors
///
/// Returns `RpcError::Transport` if the context is already attached to `bus`.
pub async fn create_memory_transport_with_bus(
    config: TransportConfig,
    bus: Arc<MemoryBus>,
) -> Result<TransportPtr> {
    // ---
    bus.attach(&config.context)?;

    let transport = MemoryTransport {
        base: TransportBase::from(&config),
        bus,
    };

    Ok(Arc::new(transport))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use bytes::Bytes;

    fn envelope(channel: &str, sender: ContextId) -> Envelope {
        Envelope::new(Channel::from(channel), sender, Bytes::from_static(b"x"))
    }

    #[tokio::test]
    async fn addressed_send_reaches_only_destination() {
        // ---
        let bus = MemoryBus::new();
        let hub = create_memory_transport_with_bus(TransportConfig::hub(), bus.clone())
            .await
            .unwrap();
        let w1 = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
            .await
            .unwrap();
        let w2 = create_memory_transport_with_bus(TransportConfig::peer("w2"), bus.clone())
            .await
            .unwrap();

        let mut s1 = w1.subscribe(Channel::from("c")).await.unwrap();
        let mut s2 = w2.subscribe(Channel::from("c")).await.unwrap();

        hub.send(envelope("c", ContextId::Hub).to(ContextId::peer("w2")))
            .await
            .unwrap();

        assert!(s2.recv().await.is_some());
        assert!(s1.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_listener() {
        // ---
        let bus = MemoryBus::new();
        let hub = create_memory_transport_with_bus(TransportConfig::hub(), bus.clone())
            .await
            .unwrap();
        let w1 = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
            .await
            .unwrap();

        let mut a = hub.subscribe(Channel::from("c")).await.unwrap();
        let mut b = w1.subscribe(Channel::from("c")).await.unwrap();

        w1.send(envelope("c", ContextId::peer("w1"))).await.unwrap();

        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropping_handle_deregisters() {
        // ---
        let bus = MemoryBus::new();
        let hub = create_memory_transport_with_bus(TransportConfig::hub(), bus)
            .await
            .unwrap();
        let channel = Channel::from("c");

        let handle = hub.subscribe(channel.clone()).await.unwrap();
        assert_eq!(hub.listener_count(&channel), 1);

        drop(handle);
        assert_eq!(hub.listener_count(&channel), 0);
    }

    #[tokio::test]
    async fn unsubscribe_keeps_already_delivered_envelopes() {
        // ---
        let bus = MemoryBus::new();
        let hub = create_memory_transport_with_bus(TransportConfig::hub(), bus)
            .await
            .unwrap();
        let channel = Channel::from("c");

        let mut handle = hub.subscribe(channel.clone()).await.unwrap();
        hub.send(envelope("c", ContextId::Hub)).await.unwrap();
        hub.unsubscribe(&channel, handle.id());
        hub.send(envelope("c", ContextId::Hub)).await.unwrap();

        assert!(handle.recv().await.is_some());
        assert!(handle.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_detaches_context() {
        // ---
        let bus = MemoryBus::new();
        let hub = create_memory_transport_with_bus(TransportConfig::hub(), bus.clone())
            .await
            .unwrap();
        let w1 = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
            .await
            .unwrap();

        let mut handle = w1.subscribe(Channel::from("c")).await.unwrap();
        assert!(hub.is_alive(&ContextId::peer("w1")));

        w1.close().await.unwrap();

        assert!(!hub.is_alive(&ContextId::peer("w1")));
        assert!(handle.recv().await.is_none());
        assert!(w1.send(envelope("c", ContextId::peer("w1"))).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_context_is_rejected() {
        // ---
        let bus = MemoryBus::new();
        let _first = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
            .await
            .unwrap();
        let second = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus).await;
        assert!(matches!(second, Err(RpcError::Transport(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscribe_racing_close_never_outlives_detach() {
        // ---
        let channel = Channel::from("race");

        for _ in 0..200 {
            let bus = MemoryBus::new();
            let w1 = create_memory_transport_with_bus(TransportConfig::peer("w1"), bus.clone())
                .await
                .unwrap();

            let subscriber = {
                let w1 = w1.clone();
                let channel = channel.clone();
                tokio::spawn(async move { w1.subscribe(channel).await })
            };
            let closer = {
                let w1 = w1.clone();
                tokio::spawn(async move { w1.close().await })
            };

            closer.await.unwrap().unwrap();
            // Keep any handle alive: only `detach` may have removed it.
            let handle = subscriber.await.unwrap();

            assert!(!bus.is_attached(&ContextId::peer("w1")));
            assert_eq!(bus.count(&channel), 0);
            drop(handle);
        }
    }
}
