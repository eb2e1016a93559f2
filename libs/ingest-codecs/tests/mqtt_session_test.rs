//! MQTT session against a scripted broker on a loopback socket

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::time::Duration;

use ingest_codecs::mqtt::{
    encode_publish, parse_packet, topic_matches, ConnectOptions, MqttSession, PacketType,
};
use ingest_codecs::{IoTransport, Transport};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Deserialize, PartialEq)]
struct Telemetry {
    line: String,
    temperature: f64,
}

async fn broker(stream: TcpStream) {
    let mut transport = IoTransport::new(stream);

    let connect = parse_packet(&mut transport).await.unwrap();
    assert_eq!(connect.packet_type, PacketType::Connect);
    transport.write(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

    let subscribe = parse_packet(&mut transport).await.unwrap();
    assert_eq!(subscribe.packet_type, PacketType::Subscribe);
    assert_eq!(subscribe.flags, 0x02);
    let packet_id = [subscribe.variable_header[0], subscribe.variable_header[1]];
    transport
        .write(&[0x90, 0x03, packet_id[0], packet_id[1], 0x00])
        .await
        .unwrap();

    for (topic, body) in [
        ("plant/line1/temp", r#"{"line":"line1","temperature":71.25}"#),
        ("plant/line2/temp", r#"{"line":"line2","temperature":68.0}"#),
    ] {
        let frame = encode_publish(topic, body.as_bytes(), false).unwrap();
        transport.write(&frame).await.unwrap();
    }

    let ping = parse_packet(&mut transport).await.unwrap();
    assert_eq!(ping.packet_type, PacketType::PingReq);
    transport.write(&[0xD0, 0x00]).await.unwrap();

    let disconnect = parse_packet(&mut transport).await.unwrap();
    assert_eq!(disconnect.packet_type, PacketType::Disconnect);
}

#[tokio::test]
async fn test_listen_to_broker() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        broker(stream).await;
    });

    let transport = IoTransport::connect_tcp(&addr, Duration::from_secs(2), Some(Duration::from_secs(2)))
        .await
        .unwrap();
    let mut session = MqttSession::new(transport);

    session
        .connect(&ConnectOptions::new("ingest-test", 30))
        .await
        .unwrap();
    let filter = "plant/+/temp";
    assert_eq!(session.subscribe(filter, 0).await.unwrap(), 0);

    let mut received = Vec::new();
    for _ in 0..2 {
        let publish = session.next_publish().await.unwrap();
        assert!(topic_matches(filter, &publish.topic));
        received.push(publish.json_as::<Telemetry>().unwrap());
    }
    assert_eq!(received[0].line, "line1");
    assert_eq!(received[1].temperature, 68.0);

    session.ping().await.unwrap();
    session.disconnect().await.unwrap();
    server.await.unwrap();
}
