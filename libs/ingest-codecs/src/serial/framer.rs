use bytes::Bytes;
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::packet::SensorPacket;
use crate::error::{CodecError, Result};
use crate::transport::{read_part, Transport, TransportError};

pub const DEFAULT_SYNC_BYTE: u8 = 0xAA;

/// sensor_id (2) + sensor_type (1) + checksum (1)
const BODY_OVERHEAD: usize = 4;

/// Checksum algorithm used by the sensor firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// XOR of sensor_id, sensor_type and payload
    #[default]
    BodyXor,
    /// Legacy firmware: body XOR also folds in the sync and length bytes
    FrameXor,
}

/// Framer parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    pub sync_byte: u8,
    pub checksum: ChecksumMode,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            sync_byte: DEFAULT_SYNC_BYTE,
            checksum: ChecksumMode::BodyXor,
        }
    }
}

/// A frame whose checksum did not match; the framer has resynchronized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedPacket {
    pub sensor_id: u16,
    pub sensor_type: u8,
    pub expected: u8,
    pub actual: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    Packet(SensorPacket),
    Malformed(MalformedPacket),
}

/// Framer state; `Exhausted` is terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerState {
    SeekSync,
    ReadLength,
    ReadBody { length: u8 },
    Validate { length: u8, body: Bytes },
    Emit(SensorPacket),
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub packets: u64,
    pub malformed: u64,
    /// Bytes skipped while seeking the sync byte
    pub discarded_bytes: u64,
}

/// Pull-based packet framer bound to one stream
#[derive(Debug)]
pub struct SerialPacketFramer<T> {
    transport: T,
    config: FramerConfig,
    state: FramerState,
    stats: FramerStats,
}

impl<T: Transport> SerialPacketFramer<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, FramerConfig::default())
    }

    pub fn with_config(transport: T, config: FramerConfig) -> Self {
        Self {
            transport,
            config,
            state: FramerState::SeekSync,
            stats: FramerStats::default(),
        }
    }

    pub fn state(&self) -> &FramerState {
        &self.state
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == FramerState::Exhausted
    }

    /// Advance until the next packet or malformed frame
    ///
    /// Returns `Ok(None)` once the stream ends between frames. Any error
    /// exhausts the framer.
    pub async fn next_event(&mut self) -> Result<Option<FramerEvent>> {
        loop {
            // Default to Exhausted so an early return via `?` is terminal
            let state = std::mem::replace(&mut self.state, FramerState::Exhausted);
            match state {
                FramerState::Exhausted => return Ok(None),
                FramerState::SeekSync => match self.transport.read_exact(1).await {
                    Ok(byte) if byte[0] == self.config.sync_byte => {
                        self.state = FramerState::ReadLength;
                    },
                    Ok(byte) => {
                        trace!("Discarding {:02X} while seeking sync", byte[0]);
                        self.stats.discarded_bytes += 1;
                        self.state = FramerState::SeekSync;
                    },
                    Err(TransportError::Closed { .. }) => {
                        debug!(
                            "Serial stream ended: {} packets, {} malformed, {} bytes discarded",
                            self.stats.packets, self.stats.malformed, self.stats.discarded_bytes
                        );
                        return Ok(None);
                    },
                    Err(e) => return Err(CodecError::Connection(e)),
                },
                FramerState::ReadLength => {
                    let length = read_part(&mut self.transport, 1, 1).await?;
                    self.state = FramerState::ReadBody { length: length[0] };
                },
                FramerState::ReadBody { length } => {
                    let body_len = usize::from(length) + BODY_OVERHEAD;
                    let body = read_part(&mut self.transport, body_len, 2).await?;
                    self.state = FramerState::Validate { length, body };
                },
                FramerState::Validate { length, body } => {
                    let split = body.len() - 1;
                    let expected = body[split];
                    let actual = self.checksum(length, &body[..split]);
                    let sensor_id = u16::from_be_bytes([body[0], body[1]]);
                    let sensor_type = body[2];

                    if expected != actual {
                        self.stats.malformed += 1;
                        warn!(
                            "Checksum mismatch for sensor {:04X} type {:02X}: expected {:02X}, computed {:02X}; resyncing",
                            sensor_id, sensor_type, expected, actual
                        );
                        self.state = FramerState::SeekSync;
                        return Ok(Some(FramerEvent::Malformed(MalformedPacket {
                            sensor_id,
                            sensor_type,
                            expected,
                            actual,
                        })));
                    }

                    let payload = body.slice(3..split);
                    self.state = FramerState::Emit(SensorPacket::new(sensor_id, sensor_type, payload));
                },
                FramerState::Emit(packet) => {
                    self.stats.packets += 1;
                    debug!(
                        "Sensor packet {:04X} type {:02X}: {:02X?}",
                        packet.sensor_id(),
                        packet.sensor_type(),
                        packet.payload()
                    );
                    self.state = FramerState::SeekSync;
                    return Ok(Some(FramerEvent::Packet(packet)));
                },
            }
        }
    }

    /// Consume the framer as a stream of events
    pub fn into_stream(self) -> impl Stream<Item = Result<FramerEvent>> {
        stream::unfold(self, |mut framer| async move {
            match framer.next_event().await {
                Ok(Some(event)) => Some((Ok(event), framer)),
                Ok(None) => None,
                Err(e) => Some((Err(e), framer)),
            }
        })
    }

    fn checksum(&self, length: u8, body: &[u8]) -> u8 {
        let body_xor = body.iter().fold(0u8, |acc, b| acc ^ b);
        match self.config.checksum {
            ChecksumMode::BodyXor => body_xor,
            ChecksumMode::FrameXor => self.config.sync_byte ^ length ^ body_xor,
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::transport::IoTransport;
    use futures::StreamExt;
    use tokio_test::io::Builder;
    use tracing_test::traced_test;

    fn framer(data: &[u8]) -> SerialPacketFramer<IoTransport<tokio_test::io::Mock>> {
        SerialPacketFramer::new(IoTransport::new(Builder::new().read(data).build()))
    }

    fn packet(event: FramerEvent) -> SensorPacket {
        match event {
            FramerEvent::Packet(packet) => packet,
            other => panic!("expected packet, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_payload_packet() {
        let mut framer = framer(&[0xAA, 0x00, 0x12, 0x34, 0x01, 0x27]);

        let packet = packet(framer.next_event().await.unwrap().unwrap());
        assert_eq!(packet.sensor_id(), 0x1234);
        assert_eq!(packet.sensor_type(), 0x01);
        assert!(packet.payload().is_empty());

        assert!(framer.next_event().await.unwrap().is_none());
        assert!(framer.is_exhausted());
        assert_eq!(framer.stats().packets, 1);
    }

    #[tokio::test]
    async fn test_skips_noise_before_sync() {
        let mut framer = framer(&[0x00, 0xFF, 0x13, 0xAA, 0x02, 0x00, 0x07, 0x02, 0x01, 0xF4, 0xF0]);

        let packet = packet(framer.next_event().await.unwrap().unwrap());
        assert_eq!(packet.sensor_id(), 0x0007);
        assert_eq!(packet.payload(), &[0x01, 0xF4]);
        assert_eq!(framer.stats().discarded_bytes, 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_bad_checksum_reports_and_resyncs() {
        let mut data = vec![0xAA, 0x00, 0x12, 0x34, 0x01, 0x28];
        data.extend_from_slice(&[0xAA, 0x00, 0x00, 0x05, 0x03, 0x06]);
        let mut framer = framer(&data);

        match framer.next_event().await.unwrap().unwrap() {
            FramerEvent::Malformed(bad) => {
                assert_eq!(bad.sensor_id, 0x1234);
                assert_eq!(bad.expected, 0x28);
                assert_eq!(bad.actual, 0x27);
            },
            other => panic!("expected malformed event, got {:?}", other),
        }
        assert!(logs_contain("Checksum mismatch"));

        let packet = packet(framer.next_event().await.unwrap().unwrap());
        assert_eq!(packet.sensor_id(), 0x0005);
        assert_eq!(packet.sensor_type(), 0x03);

        let stats = framer.stats();
        assert_eq!(stats.packets, 1);
        assert_eq!(stats.malformed, 1);
    }

    #[tokio::test]
    async fn test_stream_ends_inside_body() {
        let mut framer = framer(&[0xAA, 0x04, 0x12, 0x34, 0x01, 0x00]);

        let err = framer.next_event().await.unwrap_err();
        assert!(matches!(
            err,
            CodecError::IncompleteFrame {
                needed: 10,
                received: 6
            }
        ));
        assert!(framer.is_exhausted());
        assert!(framer.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stream_ends_after_sync() {
        let mut framer = framer(&[0xAA]);
        let err = framer.next_event().await.unwrap_err();
        assert!(matches!(err, CodecError::IncompleteFrame { .. }));
    }

    #[tokio::test]
    async fn test_frame_xor_mode() {
        // 0xAA ^ 0x01 ^ 0x00 ^ 0x09 ^ 0x04 ^ 0x10 = 0xB6
        let mock = Builder::new()
            .read(&[0xAA, 0x01, 0x00, 0x09, 0x04, 0x10, 0xB6])
            .build();
        let config = FramerConfig {
            sync_byte: 0xAA,
            checksum: ChecksumMode::FrameXor,
        };
        let mut framer = SerialPacketFramer::with_config(IoTransport::new(mock), config);

        let packet = packet(framer.next_event().await.unwrap().unwrap());
        assert_eq!(packet.sensor_id(), 0x0009);
        assert_eq!(packet.payload(), &[0x10]);
    }

    #[tokio::test]
    async fn test_custom_sync_byte() {
        let mock = Builder::new().read(&[0xAA, 0x55, 0x00, 0x00, 0x01, 0x02, 0x03]).build();
        let config = FramerConfig {
            sync_byte: 0x55,
            ..FramerConfig::default()
        };
        let mut framer = SerialPacketFramer::with_config(IoTransport::new(mock), config);

        let packet = packet(framer.next_event().await.unwrap().unwrap());
        assert_eq!(packet.sensor_id(), 0x0001);
        assert_eq!(framer.stats().discarded_bytes, 1);
    }

    #[tokio::test]
    async fn test_into_stream() {
        let mut data = vec![0xAA, 0x00, 0x12, 0x34, 0x01, 0x27];
        data.extend_from_slice(&[0xAA, 0x00, 0x12, 0x34, 0x01, 0x00]);
        data.extend_from_slice(&[0xAA, 0x00, 0x12, 0x34, 0x01, 0x27]);

        let events: Vec<_> = framer(&data).into_stream().collect().await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Ok(FramerEvent::Packet(_))));
        assert!(matches!(events[1], Ok(FramerEvent::Malformed(_))));
        assert!(matches!(events[2], Ok(FramerEvent::Packet(_))));
    }

    #[test]
    fn test_config_from_yaml() {
        let config: FramerConfig = serde_yaml::from_str("checksum: frame_xor\n").unwrap();
        assert_eq!(config.sync_byte, DEFAULT_SYNC_BYTE);
        assert_eq!(config.checksum, ChecksumMode::FrameXor);
    }
}
