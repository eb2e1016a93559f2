//! MQTT control packets

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::varint::{decode_remaining_length_slice, encode_remaining_length, read_remaining_length};
use crate::error::{CodecError, Result};
use crate::transport::{read_part, Transport};

/// Protocol name carried in CONNECT
pub const PROTOCOL_NAME: &[u8] = b"MQTT";

/// Protocol level for MQTT 3.1.1
pub const PROTOCOL_LEVEL: u8 = 4;

const CONNECT_FLAG_CLEAN_SESSION: u8 = 0x02;
const SUBSCRIBE_FLAGS: u8 = 0x02;

/// Control packet type (high nibble of the fixed header)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    pub fn from_nibble(nibble: u8) -> Result<Self> {
        Ok(match nibble {
            1 => Self::Connect,
            2 => Self::ConnAck,
            3 => Self::Publish,
            4 => Self::PubAck,
            5 => Self::PubRec,
            6 => Self::PubRel,
            7 => Self::PubComp,
            8 => Self::Subscribe,
            9 => Self::SubAck,
            10 => Self::Unsubscribe,
            11 => Self::UnsubAck,
            12 => Self::PingReq,
            13 => Self::PingResp,
            14 => Self::Disconnect,
            other => {
                return Err(CodecError::Protocol(format!(
                    "Reserved packet type {}",
                    other
                )))
            },
        })
    }

    /// Fixed-header flag bits mandated for this type (PUBLISH carries its own)
    fn required_flags(self) -> Option<u8> {
        match self {
            Self::Publish => None,
            Self::PubRel | Self::Subscribe | Self::Unsubscribe => Some(0x02),
            _ => Some(0x00),
        }
    }
}

/// One complete control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPacket {
    pub packet_type: PacketType,
    /// Low nibble of the fixed header
    pub flags: u8,
    pub remaining_length: u32,
    pub variable_header: Bytes,
    pub payload: Bytes,
}

impl MqttPacket {
    /// Build an outbound packet; remaining length is derived from the parts
    pub fn new(
        packet_type: PacketType,
        flags: u8,
        variable_header: impl Into<Bytes>,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let variable_header = variable_header.into();
        let payload = payload.into();
        let total = variable_header.len() + payload.len();
        let remaining_length =
            u32::try_from(total).map_err(|_| CodecError::RemainingLengthTooLarge(u32::MAX))?;
        Ok(Self {
            packet_type,
            flags: flags & 0x0F,
            remaining_length,
            variable_header,
            payload,
        })
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let length = encode_remaining_length(self.remaining_length)?;
        let mut frame =
            Vec::with_capacity(1 + length.len() + self.remaining_length as usize);
        frame.push(((self.packet_type as u8) << 4) | self.flags);
        frame.extend_from_slice(&length);
        frame.extend_from_slice(&self.variable_header);
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Parse exactly one packet from an in-memory frame
    pub fn from_frame(frame: &[u8]) -> Result<Self> {
        let (&header, rest) = frame.split_first().ok_or(CodecError::FrameTooShort {
            needed: 2,
            actual: 0,
        })?;
        let (remaining, used) = decode_remaining_length_slice(rest)?;
        let body = &rest[used..];
        let remaining_usize = remaining as usize;

        if body.len() < remaining_usize {
            return Err(CodecError::IncompleteFrame {
                needed: 1 + used + remaining_usize,
                received: frame.len(),
            });
        }
        if body.len() > remaining_usize {
            return Err(CodecError::Protocol(format!(
                "{} trailing bytes after packet",
                body.len() - remaining_usize
            )));
        }

        Self::from_parts(header, remaining, Bytes::copy_from_slice(body))
    }

    /// Classify and split a packet whose body has been read in full
    fn from_parts(header: u8, remaining_length: u32, body: Bytes) -> Result<Self> {
        let packet_type = PacketType::from_nibble(header >> 4)?;
        let flags = header & 0x0F;

        if let Some(required) = packet_type.required_flags() {
            if flags != required {
                return Err(CodecError::Protocol(format!(
                    "{:?}: invalid fixed header flags 0x{:X}",
                    packet_type, flags
                )));
            }
        }

        let header_len = match packet_type {
            PacketType::Connect => {
                let name_len = read_u16(&body, 0, packet_type)? as usize;
                // name + level + connect flags + keepalive
                2 + name_len + 1 + 1 + 2
            },
            PacketType::Publish => {
                let qos = (flags >> 1) & 0x03;
                if qos == 3 {
                    return Err(CodecError::Protocol("PUBLISH with QoS 3".to_string()));
                }
                let topic_len = read_u16(&body, 0, packet_type)? as usize;
                2 + topic_len + if qos > 0 { 2 } else { 0 }
            },
            PacketType::ConnAck
            | PacketType::PubAck
            | PacketType::PubRec
            | PacketType::PubRel
            | PacketType::PubComp
            | PacketType::Subscribe
            | PacketType::SubAck
            | PacketType::Unsubscribe
            | PacketType::UnsubAck => 2,
            PacketType::PingReq | PacketType::PingResp | PacketType::Disconnect => {
                if !body.is_empty() {
                    return Err(CodecError::Protocol(format!(
                        "{:?} must have remaining length 0, got {}",
                        packet_type,
                        body.len()
                    )));
                }
                0
            },
        };

        if body.len() < header_len {
            return Err(CodecError::Protocol(format!(
                "{:?}: variable header needs {} bytes, packet has {}",
                packet_type,
                header_len,
                body.len()
            )));
        }

        let variable_header = body.slice(..header_len);
        let payload = body.slice(header_len..);
        debug!(
            "MQTT {:?}: flags=0x{:X}, remaining={}, header={}, payload={}",
            packet_type,
            flags,
            remaining_length,
            variable_header.len(),
            payload.len()
        );

        Ok(Self {
            packet_type,
            flags,
            remaining_length,
            variable_header,
            payload,
        })
    }
}

fn read_u16(data: &[u8], at: usize, packet_type: PacketType) -> Result<u16> {
    match data.get(at..at + 2) {
        Some(pair) => Ok(u16::from_be_bytes([pair[0], pair[1]])),
        None => Err(CodecError::Protocol(format!(
            "{:?}: truncated length field",
            packet_type
        ))),
    }
}

fn push_string(buf: &mut Vec<u8>, value: &[u8], what: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| {
        CodecError::Protocol(format!("{} longer than 65535 bytes", what))
    })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(value);
    Ok(())
}

// ============================================================================
// Encoders
// ============================================================================

/// CONNECT options
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    pub client_id: &'a str,
    pub keepalive_seconds: u16,
    pub clean_session: bool,
}

impl<'a> ConnectOptions<'a> {
    pub fn new(client_id: &'a str, keepalive_seconds: u16) -> Self {
        Self {
            client_id,
            keepalive_seconds,
            clean_session: true,
        }
    }
}

/// CONNECT with a clean session
pub fn encode_connect(client_id: &str, keepalive_seconds: u16) -> Result<Vec<u8>> {
    encode_connect_with(&ConnectOptions::new(client_id, keepalive_seconds))
}

pub fn encode_connect_with(options: &ConnectOptions<'_>) -> Result<Vec<u8>> {
    let mut variable_header = Vec::with_capacity(10);
    push_string(&mut variable_header, PROTOCOL_NAME, "protocol name")?;
    variable_header.push(PROTOCOL_LEVEL);
    variable_header.push(if options.clean_session {
        CONNECT_FLAG_CLEAN_SESSION
    } else {
        0
    });
    variable_header.extend_from_slice(&options.keepalive_seconds.to_be_bytes());

    let mut payload = Vec::with_capacity(2 + options.client_id.len());
    push_string(&mut payload, options.client_id.as_bytes(), "client id")?;

    MqttPacket::new(PacketType::Connect, 0, variable_header, payload)?.encode()
}

/// SUBSCRIBE to a single topic filter
pub fn encode_subscribe(packet_id: u16, topic: &str, qos: u8) -> Result<Vec<u8>> {
    if qos > 2 {
        return Err(CodecError::Protocol(format!("Invalid QoS {}", qos)));
    }
    let mut payload = Vec::with_capacity(3 + topic.len());
    push_string(&mut payload, topic.as_bytes(), "topic filter")?;
    payload.push(qos);

    MqttPacket::new(
        PacketType::Subscribe,
        SUBSCRIBE_FLAGS,
        packet_id.to_be_bytes().to_vec(),
        payload,
    )?
    .encode()
}

/// PUBLISH at QoS 0
pub fn encode_publish(topic: &str, payload: &[u8], retain: bool) -> Result<Vec<u8>> {
    let mut variable_header = Vec::with_capacity(2 + topic.len());
    push_string(&mut variable_header, topic.as_bytes(), "topic")?;
    let flags = if retain { 0x01 } else { 0x00 };
    MqttPacket::new(
        PacketType::Publish,
        flags,
        variable_header,
        Bytes::copy_from_slice(payload),
    )?
    .encode()
}

pub fn encode_pingreq() -> Vec<u8> {
    vec![(PacketType::PingReq as u8) << 4, 0x00]
}

pub fn encode_disconnect() -> Vec<u8> {
    vec![(PacketType::Disconnect as u8) << 4, 0x00]
}

pub(crate) fn encode_puback(packet_id: u16) -> Vec<u8> {
    let id = packet_id.to_be_bytes();
    vec![(PacketType::PubAck as u8) << 4, 0x02, id[0], id[1]]
}

// ============================================================================
// Parsing from a transport
// ============================================================================

/// Read exactly one packet; never surfaces a partial packet
pub async fn parse_packet<T>(transport: &mut T) -> Result<MqttPacket>
where
    T: Transport + ?Sized,
{
    let header = read_part(transport, 1, 0).await?[0];
    let (remaining, used) = read_remaining_length(transport, 1).await?;
    let body = if remaining == 0 {
        Bytes::new()
    } else {
        read_part(transport, remaining as usize, 1 + used).await?
    };
    MqttPacket::from_parts(header, remaining, body)
}

// ============================================================================
// Packet views
// ============================================================================

/// CONNACK return codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReturnCode {
    Accepted,
    UnacceptableProtocol,
    IdentifierRejected,
    ServerUnavailable,
    BadCredentials,
    NotAuthorized,
    Unknown(u8),
}

impl From<u8> for ConnectReturnCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::UnacceptableProtocol,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadCredentials,
            5 => Self::NotAuthorized,
            other => Self::Unknown(other),
        }
    }
}

impl ConnectReturnCode {
    pub fn description(self) -> &'static str {
        match self {
            Self::Accepted => "Connection accepted",
            Self::UnacceptableProtocol => "Unacceptable protocol version",
            Self::IdentifierRejected => "Client identifier rejected",
            Self::ServerUnavailable => "Server unavailable",
            Self::BadCredentials => "Bad user name or password",
            Self::NotAuthorized => "Not authorized",
            Self::Unknown(_) => "Unknown return code",
        }
    }
}

/// CONNACK view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

impl ConnAck {
    pub fn from_packet(packet: &MqttPacket) -> Result<Self> {
        expect_type(packet, PacketType::ConnAck)?;
        let vh = header_bytes(packet, 2)?;
        Ok(Self {
            session_present: vh[0] & 0x01 != 0,
            return_code: ConnectReturnCode::from(vh[1]),
        })
    }
}

/// SUBACK view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    /// Granted QoS per filter, 0x80 for failure
    pub return_codes: Vec<u8>,
}

impl SubAck {
    pub fn from_packet(packet: &MqttPacket) -> Result<Self> {
        expect_type(packet, PacketType::SubAck)?;
        let vh = header_bytes(packet, 2)?;
        Ok(Self {
            packet_id: u16::from_be_bytes([vh[0], vh[1]]),
            return_codes: packet.payload.to_vec(),
        })
    }
}

/// PUBLISH view; the payload is exposed as raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub topic: String,
    pub packet_id: Option<u16>,
    pub qos: u8,
    pub retain: bool,
    pub dup: bool,
    pub payload: Bytes,
}

impl Publish {
    pub fn from_packet(packet: &MqttPacket) -> Result<Self> {
        expect_type(packet, PacketType::Publish)?;
        let qos = (packet.flags >> 1) & 0x03;
        let vh = header_bytes(packet, 2)?;
        let topic_len = usize::from(u16::from_be_bytes([vh[0], vh[1]]));
        let vh = header_bytes(packet, 2 + topic_len + if qos > 0 { 2 } else { 0 })?;
        let topic = std::str::from_utf8(&vh[2..2 + topic_len])
            .map_err(|e| CodecError::Protocol(format!("PUBLISH topic is not UTF-8: {}", e)))?
            .to_string();

        let packet_id = if qos > 0 {
            Some(u16::from_be_bytes([vh[2 + topic_len], vh[3 + topic_len]]))
        } else {
            None
        };

        Ok(Self {
            topic,
            packet_id,
            qos,
            retain: packet.flags & 0x01 != 0,
            dup: packet.flags & 0x08 != 0,
            payload: packet.payload.clone(),
        })
    }

    /// Explicit UTF-8 view of the payload
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload).map_err(CodecError::PayloadNotUtf8)
    }

    /// UTF-8 then JSON decode of the payload
    pub fn json(&self) -> Result<serde_json::Value> {
        self.json_as()
    }

    /// UTF-8 then JSON decode into a typed value
    pub fn json_as<V: DeserializeOwned>(&self) -> Result<V> {
        let text = self.text()?;
        serde_json::from_str(text).map_err(|e| CodecError::PayloadNotJson(e.to_string()))
    }
}

fn header_bytes(packet: &MqttPacket, needed: usize) -> Result<&[u8]> {
    if packet.variable_header.len() < needed {
        return Err(CodecError::Protocol(format!(
            "{:?}: variable header has {} bytes, need {}",
            packet.packet_type,
            packet.variable_header.len(),
            needed
        )));
    }
    Ok(&packet.variable_header[..])
}

fn expect_type(packet: &MqttPacket, expected: PacketType) -> Result<()> {
    if packet.packet_type != expected {
        return Err(CodecError::Protocol(format!(
            "Expected {:?}, got {:?}",
            expected, packet.packet_type
        )));
    }
    Ok(())
}
