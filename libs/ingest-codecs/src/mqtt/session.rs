//! Minimal MQTT client session over one transport
//!
//! Enough protocol for a telemetry listener: connect, subscribe, receive
//! PUBLISH messages at QoS 0 or 1, keepalive pings and disconnect.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use super::packet::{
    encode_connect_with, encode_disconnect, encode_pingreq, encode_puback, encode_publish,
    encode_subscribe, parse_packet, ConnAck, ConnectOptions, ConnectReturnCode, MqttPacket,
    PacketType, Publish, SubAck,
};
use crate::error::{CodecError, Result};
use crate::transport::Transport;

const SUBSCRIBE_FAILURE: u8 = 0x80;

/// Client session; one exchange in flight at a time
#[derive(Debug)]
pub struct MqttSession<T> {
    transport: T,
    /// Session-local packet identifier counter, never 0
    next_packet_id: u16,
    /// PUBLISH packets that arrived while waiting for an acknowledgement
    pending: VecDeque<Publish>,
}

impl<T: Transport> MqttSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_packet_id: 1,
            pending: VecDeque::new(),
        }
    }

    fn next_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.wrapping_add(1);
        if self.next_packet_id == 0 {
            self.next_packet_id = 1;
        }
        id
    }

    /// Send CONNECT and require an accepting CONNACK
    pub async fn connect(&mut self, options: &ConnectOptions<'_>) -> Result<ConnAck> {
        let frame = encode_connect_with(options)?;
        self.transport.write(&frame).await?;

        let packet = parse_packet(&mut self.transport).await?;
        let connack = ConnAck::from_packet(&packet)?;
        if connack.return_code != ConnectReturnCode::Accepted {
            warn!(
                "Broker refused connection for {}: {}",
                options.client_id,
                connack.return_code.description()
            );
            return Err(CodecError::Protocol(format!(
                "CONNACK refused: {}",
                connack.return_code.description()
            )));
        }

        info!(
            "MQTT connected as {} (session_present={})",
            options.client_id, connack.session_present
        );
        Ok(connack)
    }

    /// Subscribe to one filter, returning the granted QoS
    pub async fn subscribe(&mut self, topic: &str, qos: u8) -> Result<u8> {
        let packet_id = self.next_packet_id();
        let frame = encode_subscribe(packet_id, topic, qos)?;
        self.transport.write(&frame).await?;

        let packet = self.wait_for(PacketType::SubAck).await?;
        let suback = SubAck::from_packet(&packet)?;
        if suback.packet_id != packet_id {
            return Err(CodecError::Protocol(format!(
                "SUBACK for packet {} while waiting for {}",
                suback.packet_id, packet_id
            )));
        }

        match suback.return_codes.first().copied() {
            Some(SUBSCRIBE_FAILURE) | None => Err(CodecError::Protocol(format!(
                "Subscription to {} refused",
                topic
            ))),
            Some(granted) => {
                info!("Subscribed to {} (granted QoS {})", topic, granted);
                Ok(granted)
            },
        }
    }

    /// Publish at QoS 0
    pub async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<()> {
        let frame = encode_publish(topic, payload, retain)?;
        self.transport.write(&frame).await?;
        Ok(())
    }

    /// PINGREQ and wait for PINGRESP
    pub async fn ping(&mut self) -> Result<()> {
        self.transport.write(&encode_pingreq()).await?;
        self.wait_for(PacketType::PingResp).await?;
        Ok(())
    }

    /// Next inbound PUBLISH; QoS 1 deliveries are acknowledged
    pub async fn next_publish(&mut self) -> Result<Publish> {
        if let Some(publish) = self.pending.pop_front() {
            return Ok(publish);
        }
        loop {
            let packet = parse_packet(&mut self.transport).await?;
            match packet.packet_type {
                PacketType::Publish => return self.accept_publish(&packet).await,
                PacketType::PingResp => debug!("PINGRESP"),
                other => debug!("Ignoring {:?} while waiting for PUBLISH", other),
            }
        }
    }

    /// Send DISCONNECT and release the transport
    pub async fn disconnect(mut self) -> Result<T> {
        self.transport.write(&encode_disconnect()).await?;
        debug!("MQTT disconnected");
        Ok(self.transport)
    }

    async fn wait_for(&mut self, expected: PacketType) -> Result<MqttPacket> {
        loop {
            let packet = parse_packet(&mut self.transport).await?;
            if packet.packet_type == expected {
                return Ok(packet);
            }
            if packet.packet_type == PacketType::Publish {
                let publish = self.accept_publish(&packet).await?;
                self.pending.push_back(publish);
            } else {
                debug!("Ignoring {:?} while waiting for {:?}", packet.packet_type, expected);
            }
        }
    }

    async fn accept_publish(&mut self, packet: &MqttPacket) -> Result<Publish> {
        let publish = Publish::from_packet(packet)?;
        match (publish.qos, publish.packet_id) {
            (0, _) => {},
            (1, Some(id)) => self.transport.write(&encode_puback(id)).await?,
            _ => {
                return Err(CodecError::Protocol(format!(
                    "QoS {} delivery on {} is not supported",
                    publish.qos, publish.topic
                )))
            },
        }
        Ok(publish)
    }
}
