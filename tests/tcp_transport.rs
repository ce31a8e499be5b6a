//! Integration tests for the framed TCP transport against a local fixture
//! broker

use futures::{SinkExt, StreamExt};
use msgbus::{connect, BlockingMode, BusConfig, BusDirection, BusError, BusIo, BusTech};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::codec::{Framed, LinesCodec};

type Topics = Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>>;

/// Minimal broker speaking the crate's wire protocol on an ephemeral port.
///
/// Fan-out per topic; ACK-mode publishes are answered with OK, except the
/// payload "poison" which the fixture rejects.
async fn spawn_fixture_broker() -> (SocketAddr, Topics) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let topics: Topics = Arc::default();

    let accept_topics = Arc::clone(&topics);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };
            tokio::spawn(handle_connection(stream, Arc::clone(&accept_topics)));
        }
    });

    (addr, topics)
}

async fn handle_connection(stream: TcpStream, topics: Topics) {
    let mut framed = Framed::new(stream, LinesCodec::new());
    let handshake = match framed.next().await {
        Some(Ok(line)) => line,
        _ => return,
    };
    let toks: Vec<&str> = handshake.split(' ').collect();

    match toks.as_slice() {
        ["SUB", topic, _group] => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            topics
                .lock()
                .unwrap()
                .entry(topic.to_string())
                .or_default()
                .push(tx);
            while let Some(payload) = rx.recv().await {
                if framed.send(payload).await.is_err() {
                    return;
                }
            }
            // Subscriber channel dropped: end the connection, which ends
            // the client's inbound stream.
        }
        ["PUB", topic, mode] => {
            let ack = *mode == "ACK";
            while let Some(Ok(payload)) = framed.next().await {
                let reply = {
                    let mut map = topics.lock().unwrap();
                    let subs = map.entry(topic.to_string()).or_default();
                    if payload == "poison" {
                        "ERR rejected by fixture".to_string()
                    } else {
                        subs.retain(|tx| tx.send(payload.clone()).is_ok());
                        "OK".to_string()
                    }
                };
                if ack && framed.send(reply).await.is_err() {
                    return;
                }
            }
        }
        _ => {}
    }
}

fn tcp_config(addr: SocketAddr, topic: &str, direction: BusDirection) -> BusConfig {
    BusConfig {
        technology: Some(BusTech::Tcp),
        host: addr.ip().to_string(),
        port: addr.port(),
        topic: topic.to_string(),
        direction: Some(direction),
        retry_budget: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_blocking_pub_sub_round_trip() {
    let (addr, _topics) = spawn_fixture_broker().await;

    let reader = connect(&tcp_config(addr, "events", BusDirection::Reader))
        .await
        .unwrap();
    // Let the fixture process the SUB handshake before publishing.
    sleep(Duration::from_millis(100)).await;

    let writer = connect(&BusConfig {
        blocking: Some(BlockingMode::Blocking),
        ..tcp_config(addr, "events", BusDirection::Writer)
    })
    .await
    .unwrap();

    writer.write("over the wire").await.unwrap();
    assert_eq!(reader.read().await.unwrap(), "over the wire");

    writer.disconnect().await.unwrap();
    reader.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_blocking_write_surfaces_broker_rejection() {
    let (addr, _topics) = spawn_fixture_broker().await;

    let writer = connect(&BusConfig {
        blocking: Some(BlockingMode::Blocking),
        ..tcp_config(addr, "events", BusDirection::Writer)
    })
    .await
    .unwrap();

    assert!(matches!(
        writer.write("poison").await,
        Err(BusError::Delivery(_))
    ));
    // The connection stays open after an individual delivery failure.
    writer.write("wholesome").await.unwrap();
}

#[tokio::test]
async fn test_nonblocking_write_round_trip() {
    let (addr, _topics) = spawn_fixture_broker().await;

    let reader = connect(&tcp_config(addr, "events", BusDirection::Reader))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    let writer = connect(&tcp_config(addr, "events", BusDirection::Writer))
        .await
        .unwrap();
    writer.write("fire and forget").await.unwrap();

    assert_eq!(reader.read().await.unwrap(), "fire and forget");
}

#[tokio::test]
async fn test_reader_observes_broker_dropping_subscription() {
    let (addr, topics) = spawn_fixture_broker().await;

    let reader = connect(&tcp_config(addr, "events", BusDirection::Reader))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    // Dropping the fixture's subscriber channels closes the TCP connection,
    // ending the reader's inbound stream.
    topics.lock().unwrap().clear();

    assert!(matches!(reader.read().await, Err(BusError::ChannelClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_connect_fails_when_no_broker_listens() {
    // Port 1 on localhost refuses connections.
    let config = BusConfig {
        technology: Some(BusTech::Tcp),
        host: "127.0.0.1".to_string(),
        port: 1,
        topic: "events".to_string(),
        direction: Some(BusDirection::Writer),
        retry_budget: 2,
        ..Default::default()
    };

    assert!(matches!(
        connect(&config).await,
        Err(BusError::RetriesExhausted { attempts: 2 })
    ));
}
