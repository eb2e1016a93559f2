//! ingestctl - operator CLI over the ingest codecs
//!
//! Decode mainframe batch files, frame serial captures, compute CRCs, poll a
//! MODBUS device and listen to an MQTT broker.

mod config;
mod mainframe;
mod modbus;
mod mqtt;
mod serial;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use errors::{IngestError, IngestErrorTrait};
use ingest_codecs::CodecError;

use crate::config::{IngestctlConfig, SERVICE_NAME};

#[derive(Parser)]
#[command(name = "ingestctl")]
#[command(about = "Field-device and mainframe ingest tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (overrides --config-dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding default.yaml / ingestctl.yaml
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mainframe batch files
    Mainframe {
        #[command(subcommand)]
        command: mainframe::MainframeCommands,
    },

    /// RS-485 sensor packets
    Serial {
        #[command(subcommand)]
        command: serial::SerialCommands,
    },

    /// MODBUS devices
    Modbus {
        #[command(subcommand)]
        command: modbus::ModbusCommands,
    },

    /// MQTT telemetry
    Mqtt {
        #[command(subcommand)]
        command: mqtt::MqttCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = IngestctlConfig::load(cli.config.as_deref(), &cli.config_dir)?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.no_color {
        config.logging.ansi = false;
    }
    let _log_guard = common::init_logging(SERVICE_NAME, &config.logging)?;

    match cli.command {
        Commands::Mainframe { command } => mainframe::handle_command(command, &config),
        Commands::Serial { command } => serial::handle_command(command, &config).await,
        Commands::Modbus { command } => modbus::handle_command(command, &config).await,
        Commands::Mqtt { command } => mqtt::handle_command(command, &config).await,
    }
}

/// Map the failure to a process exit code by error category
fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(codec) = err.downcast_ref::<CodecError>() {
        return codec.category().exit_code();
    }
    if let Some(ingest) = err.downcast_ref::<IngestError>() {
        return ingest.exit_code();
    }
    1
}
