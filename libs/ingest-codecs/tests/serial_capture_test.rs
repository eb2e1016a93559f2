//! Serial framer over a recorded RS-485 capture file

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use futures::StreamExt;
use ingest_codecs::serial::{FramerEvent, Reading, ReadingRegistry, SensorTally, SerialPacketFramer};
use ingest_codecs::{CodecError, IoTransport};
use std::io::Write;

fn frame(sensor_id: u16, sensor_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = sensor_id.to_be_bytes().to_vec();
    body.push(sensor_type);
    body.extend_from_slice(payload);
    let checksum = body.iter().fold(0u8, |acc, b| acc ^ b);

    let mut out = vec![0xAA, payload.len() as u8];
    out.extend_from_slice(&body);
    out.push(checksum);
    out
}

fn capture(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

async fn open(file: &tempfile::NamedTempFile) -> SerialPacketFramer<IoTransport<tokio::fs::File>> {
    let handle = tokio::fs::File::open(file.path()).await.unwrap();
    SerialPacketFramer::new(IoTransport::new(handle))
}

#[tokio::test]
async fn test_capture_with_noise_and_corruption() {
    let mut data = vec![0x00, 0x13, 0x37];
    data.extend(frame(0x0101, 0x01, &215i16.to_be_bytes()));
    let mut corrupted = frame(0x0202, 0x02, &101_325u32.to_be_bytes());
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xFF;
    data.extend(corrupted);
    data.extend(frame(0x0303, 0x03, &3.5f32.to_be_bytes()));
    data.extend(frame(0x0404, 0x04, &[0x00, 0x3C, 0x00, 0x19]));
    data.extend(frame(0x0505, 0x7E, &[]));

    let file = capture(&data);
    let framer = open(&file).await;
    let registry = ReadingRegistry::with_builtin();
    let mut tally = SensorTally::new();
    let mut readings = Vec::new();

    let mut events = Box::pin(framer.into_stream());
    while let Some(event) = events.next().await {
        match event.unwrap() {
            FramerEvent::Packet(packet) => {
                tally.record_packet(&packet);
                readings.push((packet.sensor_id(), registry.decode(&packet)));
            },
            FramerEvent::Malformed(bad) => tally.record_malformed(bad.sensor_id, bad.sensor_type),
        }
    }

    assert_eq!(
        readings,
        vec![
            (0x0101, Some(Reading::Temperature { celsius: 21.5 })),
            (0x0303, Some(Reading::Flow { litres_per_minute: 3.5 })),
            (
                0x0404,
                Some(Reading::Vibration {
                    frequency_hz: 60,
                    amplitude_mm_s: 0.25
                })
            ),
            (0x0505, None),
        ]
    );

    let counts: Vec<_> = tally.iter().map(|(id, s)| (id, s.packets, s.malformed)).collect();
    assert_eq!(
        counts,
        vec![(0x0101, 1, 0), (0x0202, 0, 1), (0x0303, 1, 0), (0x0404, 1, 0), (0x0505, 1, 0)]
    );
}

#[tokio::test]
async fn test_capture_cut_mid_frame() {
    let mut data = frame(0x0001, 0x01, &[0x00, 0xC8]);
    data.extend_from_slice(&frame(0x0002, 0x02, &[0, 0, 0, 1])[..5]);

    let file = capture(&data);
    let mut framer = open(&file).await;

    assert!(matches!(framer.next_event().await.unwrap(), Some(FramerEvent::Packet(_))));
    let err = framer.next_event().await.unwrap_err();
    assert!(matches!(err, CodecError::IncompleteFrame { .. }));
    assert!(framer.next_event().await.unwrap().is_none());

    let stats = framer.stats();
    assert_eq!(stats.packets, 1);
    assert_eq!(stats.discarded_bytes, 0);
}
