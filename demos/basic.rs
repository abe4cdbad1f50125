//! Basic FTL Comms Example
//!
//! Starts the built-in line protocol, plays the part of a client over
//! loopback and prints what each side sees.
//!
//! Run with: cargo run --example basic

use std::net::Ipv4Addr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use ftl_comms::standard::{FtlSimpleProtocol, ServerConfig};
use ftl_comms::{EventKind, ProtocolInterface};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("FTL Comms Basic Example\n");

    let protocol = FtlSimpleProtocol::with_config(ServerConfig {
        bind: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        ..ServerConfig::default()
    });

    for kind in EventKind::ALL {
        protocol
            .events()
            .on(kind, |event| println!("robot <- {:?}", event));
    }

    protocol.start().await?;
    let addr = protocol.local_addr().ok_or("protocol not listening")?;
    println!("Listening on {}\n", addr);

    // Client side
    let stream = TcpStream::connect(addr).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(b"RC:EN\nD:1:1\nA:2:0.5\nP:3:").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    writer.write_all(b"128\nS:hello robot\nRC:drive:forward\nRC:DS\n").await?;

    while protocol.client_count().await == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Robot side reports back to the client
    protocol.set_digital_input(3, true);
    protocol.set_analog_input(0, 12.6);
    protocol.send_status("battery", "ok");

    for _ in 0..3 {
        let mut line = String::new();
        reader.read_line(&mut line).await?;
        print!("client <- {}", line);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    protocol.stop().await?;
    Ok(())
}
