//! Demo: producer and both consumption styles against the in-process broker.
//!
//! Run with `cargo run --example pubsub_demo`.

use msgbus::{
    connect_with, BlockingMode, BusConfig, BusDirection, BusIo, BusTech, MemoryBroker,
};

#[tokio::main]
async fn main() -> msgbus::Result<()> {
    tracing_subscriber::fmt::init();

    let broker = MemoryBroker::new();
    let topic_config = |direction| BusConfig {
        technology: Some(BusTech::Tcp),
        topic: "telemetry".to_string(),
        direction: Some(direction),
        blocking: Some(BlockingMode::Blocking),
        retry_budget: 1,
        ..Default::default()
    };

    // Polling consumer: messages land on the bounded internal queue.
    let polling = connect_with(&topic_config(BusDirection::Reader), &broker).await?;

    // Callback consumer: the receiver loop invokes the callback per message.
    let push = connect_with(&topic_config(BusDirection::Reader), &broker).await?;
    push.register_callback(|msg| println!("callback received: {msg}"))?;

    let writer = connect_with(&topic_config(BusDirection::Writer), &broker).await?;
    for reading in ["temp=41", "temp=42", "temp=43"] {
        writer.write(reading).await?;
    }

    for _ in 0..3 {
        println!("polled: {}", polling.read().await?);
    }
    println!("queue depth after draining: {}", polling.messages_available());

    writer.disconnect().await?;
    polling.disconnect().await?;
    push.disconnect().await?;
    Ok(())
}
