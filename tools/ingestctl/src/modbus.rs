//! `ingestctl modbus` - CRC helper and register polling

use std::time::Duration;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use common::hex;
use ingest_codecs::modbus::{crc16, FrameMode, ModbusClient, RegisterBank};
use ingest_codecs::serial::open_serial;
use ingest_codecs::{CodecError, IoTransport, Transport};

use crate::config::{millis, IngestctlConfig, ModbusParams};

#[derive(Subcommand)]
pub enum ModbusCommands {
    /// Compute the MODBUS CRC16 of a hex frame
    Crc {
        /// Frame bytes, e.g. "01 03 00 00 00 0A"
        hex: String,
    },

    /// Read registers from the configured device
    Read {
        /// First register address
        #[arg(short, long)]
        start: u16,

        /// Number of registers
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u16,

        /// Read input registers (FC04) instead of holding registers (FC03)
        #[arg(long)]
        input: bool,
    },
}

pub async fn handle_command(command: ModbusCommands, config: &IngestctlConfig) -> Result<()> {
    match command {
        ModbusCommands::Crc { hex } => {
            let (crc, frame) = rtu_frame(&hex)?;
            println!("{} 0x{:04X}", "CRC16:".bright_cyan(), crc);
            println!("{} {}", "RTU frame:".bright_cyan(), hex::encode_spaced(&frame));
            Ok(())
        },
        ModbusCommands::Read {
            start,
            count,
            input,
        } => {
            let params = &config.modbus;
            let bank = match params.mode {
                FrameMode::Tcp => {
                    let transport = IoTransport::connect_tcp(
                        &params.address(),
                        Duration::from_millis(params.connect_timeout_ms),
                        millis(params.read_timeout_ms),
                    )
                    .await
                    .map_err(CodecError::from)?;
                    read_registers(transport, params, start, count, input).await?
                },
                FrameMode::Rtu => {
                    let transport = open_serial(&config.serial_port)?;
                    read_registers(transport, params, start, count, input).await?
                },
            };
            print_bank(&bank);
            Ok(())
        },
    }
}

/// Returns the CRC and the frame with the CRC appended low byte first
fn rtu_frame(input: &str) -> Result<(u16, Vec<u8>)> {
    let mut frame = hex::decode(input)?;
    let crc = crc16(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok((crc, frame))
}

async fn read_registers<T: Transport>(
    transport: T,
    params: &ModbusParams,
    start: u16,
    count: u16,
    input: bool,
) -> Result<RegisterBank> {
    let mut client = ModbusClient::new(transport, params.mode, params.unit_id);
    let bank = if input {
        client.read_input_registers(start, count).await?
    } else {
        client.read_holding_registers(start, count).await?
    };
    Ok(bank)
}

fn print_bank(bank: &RegisterBank) {
    println!("{:>8}  {:>6}  {:>6}", "ADDRESS".bright_cyan(), "HEX".bright_cyan(), "VALUE".bright_cyan());
    for (offset, word) in bank.words().iter().enumerate() {
        let address = usize::from(bank.base_address()) + offset;
        println!("{:>8}  0x{:04X}  {:>6}", address, word, word);
    }
}
