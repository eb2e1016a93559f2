//! MODBUS TCP client against an in-process register server
//!
//! The server speaks raw MBAP over a loopback socket so the client exercises
//! real stream framing, partial reads and the transaction id check.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::time::Duration;

use ingest_codecs::modbus::{FrameMode, ModbusClient};
use ingest_codecs::{CodecError, IoTransport, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const REGISTER_COUNT: u16 = 100;

/// Holding registers 0..100 hold `address * 10`
async fn serve_registers(mut stream: TcpStream) {
    let mut registers: Vec<u16> = (0..REGISTER_COUNT).map(|a| a * 10).collect();
    loop {
        let mut header = [0u8; 7];
        if stream.read_exact(&mut header).await.is_err() {
            return;
        }
        let length = usize::from(u16::from_be_bytes([header[4], header[5]]));
        let mut pdu = vec![0u8; length - 1];
        stream.read_exact(&mut pdu).await.unwrap();

        let function_code = pdu[0];
        let address = u16::from_be_bytes([pdu[1], pdu[2]]);
        let value = u16::from_be_bytes([pdu[3], pdu[4]]);

        let response_pdu = match function_code {
            0x03 if address + value <= REGISTER_COUNT => {
                let mut out = vec![0x03, (value * 2) as u8];
                for reg in &registers[usize::from(address)..usize::from(address + value)] {
                    out.extend_from_slice(&reg.to_be_bytes());
                }
                out
            },
            0x06 if address < REGISTER_COUNT => {
                registers[usize::from(address)] = value;
                pdu[..5].to_vec()
            },
            fc => vec![fc | 0x80, 0x02],
        };

        let mut frame = Vec::new();
        frame.extend_from_slice(&header[..4]);
        frame.extend_from_slice(&((response_pdu.len() + 1) as u16).to_be_bytes());
        frame.push(header[6]);
        frame.extend_from_slice(&response_pdu);

        // Split the response to force multi-read framing
        let (head, tail) = frame.split_at(3);
        stream.write_all(head).await.unwrap();
        stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        stream.write_all(tail).await.unwrap();
    }
}

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_registers(stream));
        }
    });
    addr
}

async fn connect(addr: &str) -> ModbusClient<IoTransport<TcpStream>> {
    let transport = IoTransport::connect_tcp(addr, Duration::from_secs(2), Some(Duration::from_secs(2)))
        .await
        .unwrap();
    ModbusClient::new(transport, FrameMode::Tcp, 1)
}

#[tokio::test]
async fn test_read_holding_registers_over_tcp() {
    let addr = start_server().await;
    let mut client = connect(&addr).await;

    let bank = client.read_holding_registers(10, 4).await.unwrap();
    assert_eq!(bank.words(), &[100, 110, 120, 130]);
    assert_eq!(bank.register(12).unwrap(), 120);

    // Second exchange uses the next transaction id
    let bank = client.read_holding_registers(0, 2).await.unwrap();
    assert_eq!(bank.words(), &[0, 10]);
}

#[tokio::test]
async fn test_write_then_read_back() {
    let addr = start_server().await;
    let mut client = connect(&addr).await;

    client.write_single_register(5, 0xBEEF).await.unwrap();
    let bank = client.read_holding_registers(5, 1).await.unwrap();
    assert_eq!(bank.register(5).unwrap(), 0xBEEF);
}

#[tokio::test]
async fn test_out_of_range_read_is_exception() {
    let addr = start_server().await;
    let mut client = connect(&addr).await;

    let err = client.read_holding_registers(98, 5).await.unwrap_err();
    assert!(matches!(
        err,
        CodecError::ModbusException {
            function_code: 0x03,
            code: 0x02
        }
    ));
}

#[tokio::test]
async fn test_silent_device_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let _server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    let transport = IoTransport::connect_tcp(&addr, Duration::from_secs(2), Some(Duration::from_millis(100)))
        .await
        .unwrap();
    let mut client = ModbusClient::new(transport, FrameMode::Tcp, 1);

    let err = client.read_holding_registers(0, 1).await.unwrap_err();
    assert!(matches!(err, CodecError::Connection(TransportError::Timeout { .. })));
}
