//! MQTT 3.1.1 control-packet codec
//!
//! Encodes the packets a telemetry listener sends (CONNECT, SUBSCRIBE,
//! PUBLISH, PINGREQ, DISCONNECT) and parses every inbound packet type.
//! All protocol literals are byte strings; payloads stay bytes until a
//! caller asks for an explicit UTF-8 or JSON view.

mod packet;
mod session;
mod topic;
mod varint;

pub use packet::{
    encode_connect, encode_connect_with, encode_disconnect, encode_pingreq, encode_publish,
    encode_subscribe, parse_packet, ConnAck, ConnectOptions, ConnectReturnCode, MqttPacket,
    PacketType, Publish, SubAck, PROTOCOL_LEVEL, PROTOCOL_NAME,
};
pub use session::MqttSession;
pub use topic::topic_matches;
pub use varint::{
    decode_remaining_length, decode_remaining_length_slice, encode_remaining_length,
    MAX_REMAINING_LENGTH,
};
