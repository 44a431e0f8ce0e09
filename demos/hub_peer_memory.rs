//! Hub and peer RPC example using the in-memory transport.
//!
//! A hub context answers `read_sensor`; a peer context answers
//! `render_status` scoped to itself. Each side calls the other, and one call
//! fails on purpose to show how handler errors arrive at the caller.
//!
//! Run with: RUST_LOG=chanrpc=debug cargo run --example hub_peer_memory

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::panic_in_result_fn
)]

use chanrpc::{
    //
    create_memory_transport_with_bus,
    MemoryBus,
    PeerId,
    RemoteError,
    Result,
    RpcEndpoint,
    RpcError,
    TransportConfig,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt as tracing_format, EnvFilter};

#[derive(Debug, Serialize, Deserialize)]
struct SensorReading {
    sensor: String,
    value: f32,
    unit: String,
    timestamp_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_format()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let bus = MemoryBus::new();
    let hub = RpcEndpoint::new(
        create_memory_transport_with_bus(TransportConfig::hub(), bus.clone()).await?,
    );
    let panel = RpcEndpoint::new(
        create_memory_transport_with_bus(TransportConfig::peer("panel-1"), bus.clone()).await?,
    );

    let sensors = hub
        .answer("read_sensor", |(sensor, unit): (String, String)| async move {
            // ---
            let celsius = 22.0_f32;
            let value = match unit.as_str() {
                "C" => celsius,
                "F" => celsius * 9.0 / 5.0 + 32.0,
                other => {
                    return Err(RemoteError::new(
                        "unsupported_unit",
                        format!("unit {other} is not supported"),
                    ))
                }
            };
            Ok(SensorReading {
                sensor,
                value,
                unit,
                timestamp_ms: current_time_ms(),
            })
        })
        .await?;

    let status = panel
        .answer_peer("render_status", |line: String| async move {
            println!("[panel-1] {line}");
            Ok::<_, RemoteError>(line.len())
        })
        .await?;

    // Peer -> hub.
    let temp: SensorReading = panel.call("read_sensor", &("temp-1", "F")).await?;
    println!(
        "Temperature: {} {} @ {} ({})",
        temp.value, temp.unit, temp.timestamp_ms, temp.sensor
    );

    // Hub -> peer.
    let width: usize = hub
        .call_peer(
            &PeerId::from("panel-1"),
            "render_status",
            &format!("{} = {}{}", temp.sensor, temp.value, temp.unit),
        )
        .await?;
    println!("Panel rendered {width} characters");

    // A failing call.
    match panel
        .call::<_, SensorReading>("read_sensor", &("temp-1", "K"))
        .await
    {
        Err(RpcError::Remote(err)) => println!("Remote failure: {} ({})", err.message, err.kind),
        other => println!("Unexpected outcome: {other:?}"),
    }

    // Clean shutdown
    status.dispose();
    sensors.dispose();
    panel.close().await?;
    hub.close().await?;
    Ok(())
}

fn current_time_ms() -> u64 {
    // ---
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
