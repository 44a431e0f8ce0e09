// tests/transport_memory.rs

mod common;

use bytes::Bytes;
use tokio::time::{timeout, Duration};

use chanrpc::{
    // ---
    CallEnvelope,
    Channel,
    ContextId,
    Envelope,
    MemoryBus,
    RpcEndpoint,
    TransportConfig,
    DEFAULT_CONTENT_TYPE,
};

#[tokio::test]
async fn memory_subscribe_then_send_delivers() {
    // ---
    // Arrange
    // ---
    let config = TransportConfig::peer("transport-memory-global");

    let transport = chanrpc::create_memory_transport(config)
        .await
        .expect("failed to create memory transport");

    let channel = Channel::from("test.channel");

    let mut sub = transport
        .subscribe(channel.clone())
        .await
        .expect("subscribe failed");

    let payload = Bytes::from_static(b"hello");
    let env = Envelope::new(channel.clone(), transport.context_id().clone(), payload.clone());

    // ---
    // Act
    // ---
    transport.send(env).await.expect("send failed");

    // ---
    // Assert
    // ---
    let received = timeout(Duration::from_millis(100), sub.recv())
        .await
        .expect("timed out waiting for message")
        .expect("subscription channel closed unexpectedly");

    assert_eq!(received.payload, payload);
    assert_eq!(received.channel, channel);
    assert_eq!(received.sender, ContextId::peer("transport-memory-global"));

    transport.close().await.expect("close failed");
}

#[tokio::test]
async fn memory_once_subscription_takes_one_envelope() {
    // ---
    // Arrange
    // ---
    let bus = MemoryBus::new();
    let hub = chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), bus)
        .await
        .expect("failed to create memory transport");

    let channel = Channel::from("once");
    let once = hub
        .subscribe_once(channel.clone())
        .await
        .expect("subscribe failed");
    assert_eq!(hub.listener_count(&channel), 1);

    // ---
    // Act
    // ---
    for body in [&b"first"[..], &b"second"[..]] {
        let env = Envelope::new(channel.clone(), ContextId::Hub, Bytes::copy_from_slice(body));
        hub.send(env).await.expect("send failed");
    }
    let received = once.recv().await.expect("no envelope delivered");

    // ---
    // Assert
    // ---
    assert_eq!(received.payload, Bytes::from_static(b"first"));
    assert_eq!(hub.listener_count(&channel), 0);
}

#[tokio::test]
async fn call_envelope_wire_format() {
    // ---
    // Arrange
    // ---
    common::init_logging();

    let bus = MemoryBus::new();
    let hub = chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), bus.clone())
        .await
        .expect("failed to create hub transport");
    let peer = common::endpoint(&bus, TransportConfig::peer("w1")).await;

    // A hand-written answerer listening on the raw send channel.
    let send_channel = peer.channel_namer().send_channel("add", None);
    let mut raw = hub
        .subscribe(send_channel.clone())
        .await
        .expect("subscribe failed");

    // ---
    // Act
    // ---
    let call = {
        let peer: RpcEndpoint = peer.clone();
        tokio::spawn(async move { peer.call::<_, i64>("add", &(40, 2)).await })
    };

    let request = timeout(Duration::from_secs(1), raw.recv())
        .await
        .expect("timed out waiting for call")
        .expect("subscription closed");

    // ---
    // Assert
    // ---
    assert_eq!(request.sender, ContextId::peer("w1"));
    assert_eq!(request.destination, Some(ContextId::Hub));
    assert_eq!(request.content_type.as_deref(), Some(DEFAULT_CONTENT_TYPE));

    let wire: serde_json::Value = serde_json::from_slice(&request.payload).unwrap();
    assert_eq!(wire["userArgs"], serde_json::json!([40, 2]));

    let envelope: CallEnvelope = serde_json::from_slice(&request.payload).unwrap();
    assert!(envelope
        .data_channel
        .as_str()
        .starts_with("%chanrpc-response-data-channel-add-"));
    assert!(envelope
        .error_channel
        .as_str()
        .starts_with("%chanrpc-response-error-channel-add-"));

    // Replying by hand settles the call.
    let reply = Envelope::new(envelope.data_channel, ContextId::Hub, Bytes::from_static(b"42"))
        .to(request.sender);
    hub.send(reply).await.expect("send failed");

    let sum = call.await.unwrap().expect("call failed");
    assert_eq!(sum, 42);
}
