#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use chanrpc::{
    //
    create_memory_transport_with_bus,
    Channel,
    ContextId,
    Envelope,
    MemoryBus,
    Result,
    RpcEndpoint,
    SubscriptionHandle,
    SubscriptionId,
    Transport,
    TransportBase,
    TransportConfig,
    TransportPtr,
};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Transport wrapper that remembers every channel subscribed through it, so
/// tests can check that reply listeners are gone after a call settles.
pub struct RecordingTransport {
    inner: TransportPtr,
    subscribed: Mutex<Vec<Channel>>,
}

impl RecordingTransport {
    pub fn wrap(inner: TransportPtr) -> Arc<Self> {
        Arc::new(Self {
            inner,
            subscribed: Mutex::new(Vec::new()),
        })
    }

    pub fn subscribed(&self) -> Vec<Channel> {
        self.subscribed.lock().unwrap().clone()
    }

    /// Channels subscribed for replies (data or error), in order.
    pub fn reply_channels(&self) -> Vec<Channel> {
        self.subscribed()
            .into_iter()
            .filter(|c| c.as_str().contains("-response-"))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    fn base(&self) -> &TransportBase {
        self.inner.base()
    }

    async fn send(&self, env: Envelope) -> Result<()> {
        self.inner.send(env).await
    }

    async fn subscribe(&self, channel: Channel) -> Result<SubscriptionHandle> {
        self.subscribed.lock().unwrap().push(channel.clone());
        self.inner.subscribe(channel).await
    }

    fn unsubscribe(&self, channel: &Channel, id: SubscriptionId) {
        self.inner.unsubscribe(channel, id)
    }

    fn listener_count(&self, channel: &Channel) -> usize {
        self.inner.listener_count(channel)
    }

    fn is_alive(&self, context: &ContextId) -> bool {
        self.inner.is_alive(context)
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

pub async fn endpoint(bus: &Arc<MemoryBus>, config: TransportConfig) -> RpcEndpoint {
    let transport = create_memory_transport_with_bus(config, bus.clone())
        .await
        .expect("failed to attach to memory bus");
    RpcEndpoint::new(transport)
}

pub async fn recording_endpoint(
    bus: &Arc<MemoryBus>,
    config: TransportConfig,
) -> (RpcEndpoint, Arc<RecordingTransport>) {
    let transport = create_memory_transport_with_bus(config, bus.clone())
        .await
        .expect("failed to attach to memory bus");
    let recording = RecordingTransport::wrap(transport);
    let endpoint = RpcEndpoint::new(recording.clone());
    (endpoint, recording)
}
