//! `ingestctl mqtt` - subscribe and print telemetry, one-off publish

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::*;
use ingest_codecs::mqtt::{topic_matches, ConnectOptions, MqttSession, Publish};
use ingest_codecs::{CodecError, IoTransport, Transport, TransportError};
use tracing::{debug, info};

use crate::config::{millis, IngestctlConfig, MqttParams};

#[derive(Subcommand)]
pub enum MqttCommands {
    /// Subscribe to a topic filter and print PUBLISH messages until Ctrl+C
    Listen {
        /// Topic filter, wildcards allowed
        filter: String,

        /// Requested QoS (0 or 1)
        #[arg(long, default_value_t = 0)]
        qos: u8,

        /// Stop after this many messages
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Publish one QoS 0 message
    Publish {
        topic: String,
        message: String,

        #[arg(long)]
        retain: bool,
    },
}

pub async fn handle_command(command: MqttCommands, config: &IngestctlConfig) -> Result<()> {
    match command {
        MqttCommands::Listen { filter, qos, count } => {
            if qos > 1 {
                bail!("QoS {} is not supported, use 0 or 1", qos);
            }
            let mut session = open_session(&config.mqtt).await?;
            let granted = session.subscribe(&filter, qos).await?;
            println!(
                "{} {} (granted QoS {})",
                "Subscribed:".bright_cyan(),
                filter.bright_yellow(),
                granted
            );

            let result = tokio::select! {
                result = listen(&mut session, &filter, count) => result,
                _ = common::shutdown::wait_for_shutdown() => {
                    info!("Shutdown requested");
                    Ok(())
                },
            };
            session.disconnect().await?;
            result
        },
        MqttCommands::Publish {
            topic,
            message,
            retain,
        } => {
            let mut session = open_session(&config.mqtt).await?;
            session.publish(&topic, message.as_bytes(), retain).await?;
            session.disconnect().await?;
            println!("{} {}", "✓ Published to".green(), topic);
            Ok(())
        },
    }
}

/// Idle reads time out at half the keepalive so a ping can be sent
fn read_timeout(params: &MqttParams) -> Option<Duration> {
    match params.keepalive_secs {
        0 => millis(params.read_timeout_ms),
        secs => Some(Duration::from_millis(u64::from(secs) * 500)),
    }
}

async fn open_session(params: &MqttParams) -> Result<MqttSession<IoTransport<tokio::net::TcpStream>>> {
    let transport = IoTransport::connect_tcp(&params.address(), Duration::from_secs(5), read_timeout(params))
        .await
        .map_err(CodecError::from)?;
    let mut session = MqttSession::new(transport);
    let connack = session
        .connect(&ConnectOptions::new(&params.client_id, params.keepalive_secs))
        .await?;
    debug!("CONNACK session_present={}", connack.session_present);
    Ok(session)
}

/// Print PUBLISH packets matching `filter`; others are skipped and not counted
async fn listen<T: Transport>(session: &mut MqttSession<T>, filter: &str, count: Option<u64>) -> Result<()> {
    let mut received = 0u64;
    while count.map_or(true, |limit| received < limit) {
        match session.next_publish().await {
            Ok(publish) if !topic_matches(filter, &publish.topic) => {
                debug!("Skipping {} (outside {})", publish.topic, filter);
            },
            Ok(publish) => {
                received += 1;
                print_publish(&publish);
            },
            // Nothing was consumed, so the stream is still on a packet boundary
            Err(CodecError::Connection(TransportError::Timeout { received: 0, .. })) => {
                debug!("Idle, sending PINGREQ");
                session.ping().await?;
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn print_publish(publish: &Publish) {
    let body = match publish.json() {
        Ok(value) => value.to_string(),
        Err(_) => match publish.text() {
            Ok(text) => text.to_string(),
            Err(_) => format!("{:02X?}", &publish.payload[..]),
        },
    };
    println!(
        "{} {}{}",
        publish.topic.bright_yellow(),
        if publish.retain { "[retained] " } else { "" },
        body
    );
}
