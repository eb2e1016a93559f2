//! `ingestctl serial` - run the packet framer over a capture

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use ingest_codecs::serial::{
    ChecksumMode, FramerConfig, FramerEvent, FramerStats, ReadingRegistry, SensorTally,
    SerialPacketFramer,
};
use ingest_codecs::IoTransport;

use crate::config::IngestctlConfig;

#[derive(Subcommand)]
pub enum SerialCommands {
    /// Frame a raw RS-485 capture file
    Frame {
        /// Capture file
        capture: PathBuf,

        /// Checksum covers sync and length bytes as well
        #[arg(long)]
        frame_xor: bool,
    },
}

pub async fn handle_command(command: SerialCommands, config: &IngestctlConfig) -> Result<()> {
    match command {
        SerialCommands::Frame { capture, frame_xor } => {
            let mut framer_config = config.serial.clone();
            if frame_xor {
                framer_config.checksum = ChecksumMode::FrameXor;
            }
            let report = frame_capture(&capture, framer_config, true).await?;
            print_tally(&report.tally, report.stats);
            match report.failure {
                Some(e) => Err(e.into()),
                None => Ok(()),
            }
        },
    }
}

struct CaptureReport {
    tally: SensorTally,
    stats: FramerStats,
    /// Error that ended the capture early, after the tally was collected
    failure: Option<ingest_codecs::CodecError>,
}

async fn frame_capture(path: &Path, config: FramerConfig, print: bool) -> Result<CaptureReport> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Opening {}", path.display()))?;
    let mut framer = SerialPacketFramer::with_config(IoTransport::new(file), config);
    let registry = ReadingRegistry::with_builtin();
    let mut tally = SensorTally::new();

    let failure = loop {
        match framer.next_event().await {
            Ok(Some(FramerEvent::Packet(packet))) => {
                tally.record_packet(&packet);
                if print {
                    let kind = packet.kind().map_or("unknown", |k| k.name());
                    let reading = match registry.decode(&packet) {
                        Some(reading) => serde_json::to_string(&reading)?,
                        None => format!("{:02X?}", packet.payload()),
                    };
                    println!(
                        "{} sensor {:04X} {:<12} {}",
                        "✓".green(),
                        packet.sensor_id(),
                        kind,
                        reading
                    );
                }
            },
            Ok(Some(FramerEvent::Malformed(bad))) => {
                tally.record_malformed(bad.sensor_id, bad.sensor_type);
                if print {
                    println!(
                        "{} sensor {:04X} checksum {:02X}, computed {:02X}",
                        "✗".yellow(),
                        bad.sensor_id,
                        bad.expected,
                        bad.actual
                    );
                }
            },
            Ok(None) => break None,
            Err(e) => break Some(e),
        }
    };

    Ok(CaptureReport {
        tally,
        stats: framer.stats(),
        failure,
    })
}

fn print_tally(tally: &SensorTally, stats: FramerStats) {
    println!();
    println!(
        "{} {} packets, {} malformed, {} bytes discarded",
        "Summary:".bright_cyan(),
        stats.packets.to_string().green(),
        stats.malformed,
        stats.discarded_bytes
    );
    for (sensor_id, summary) in tally.iter() {
        println!(
            "  {:04X}  type {:02X}  {:>6} packets  {:>4} malformed",
            sensor_id, summary.sensor_type, summary.packets, summary.malformed
        );
    }
}
