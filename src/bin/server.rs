//! Corvid Server Binary
//!
//! Runs a demo responder: answers ping queries with its name and
//! acknowledges every other request by echoing its fields.

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use corvid::{handler_fn, Packet, Server, ServerConfig, Status};
use tracing_subscriber::{fmt, EnvFilter};

/// Corvid Server
#[derive(Parser, Debug)]
#[command(name = "corvid-server")]
#[command(about = "Demo responder for the Corvid protocol")]
#[command(version)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Listen port
    #[arg(short, long, default_value = "9001")]
    port: u16,

    /// Name returned in ping acknowledgments
    #[arg(short, long, default_value = "corvid")]
    name: String,

    /// Payload deadline in milliseconds
    #[arg(long, default_value = "2500")]
    payload_timeout_ms: u64,

    /// Sleep between idle polls in milliseconds
    #[arg(long, default_value = "10")]
    idle_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,corvid=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("Corvid Server v{}", corvid::VERSION);

    let config = ServerConfig::builder()
        .bind_addr(args.bind)
        .port(args.port)
        .payload_timeout(Duration::from_millis(args.payload_timeout_ms))
        .build();

    let name = args.name.clone();
    let handler = handler_fn(move |request, reply| {
        let packet = request.packet;
        let answer = if packet.is_ping_query() {
            Packet::ping_ack(&name)
        } else {
            Packet::new(packet.service, Status::Acknowledge, packet.fields().iter().cloned())
        };

        if let Err(e) = reply.send(&answer) {
            tracing::warn!("Reply to {} failed: {}", request.peer, e);
        }
    });

    let mut server = match Server::try_new(config, handler) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let idle = Duration::from_millis(args.idle_ms);
    loop {
        let activity = server.poll();
        if activity.is_idle() {
            std::thread::sleep(idle);
        }
    }
}
