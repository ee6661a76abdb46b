//! Corvid CLI Client
//!
//! Sends one request to a Corvid server and prints the reply.

use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use corvid::{ChannelHandler, Client, ClientConfig, Packet, Service, Status};
use tracing_subscriber::{fmt, EnvFilter};

/// Corvid CLI
#[derive(Parser, Debug)]
#[command(name = "corvid-cli")]
#[command(about = "CLI for the Corvid protocol")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "9001")]
    port: u16,

    /// How long to wait for a reply in milliseconds
    #[arg(short, long, default_value = "3000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Query a key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },
}

impl Commands {
    fn to_packet(&self) -> Packet {
        match self {
            Commands::Ping => Packet::empty(Service::Ping, Status::Query),
            Commands::Get { key } => Packet::new(Service::Get, Status::Query, [key.as_str()]),
            Commands::Set { key, value } => {
                Packet::new(Service::Set, Status::Query, [key.as_str(), value.as_str()])
            }
            Commands::Del { key } => Packet::new(Service::Delete, Status::Query, [key.as_str()]),
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let config = ClientConfig::builder()
        .host(&args.host)
        .port(args.port)
        .build();

    let (tx, rx) = crossbeam::channel::unbounded();
    let mut client = match Client::connect(config, ChannelHandler::new(tx)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = client.send(&args.command.to_packet()) {
        eprintln!("Send failed: {}", e);
        std::process::exit(1);
    }

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    while Instant::now() < deadline && client.is_connected() {
        client.poll();

        if let Ok(request) = rx.try_recv() {
            let reply = request.packet;
            println!("{:?} {:?} {:?}", reply.service, reply.status, reply.fields());
            if reply.status == Status::Negative {
                std::process::exit(2);
            }
            return;
        }

        std::thread::sleep(Duration::from_millis(5));
    }

    eprintln!("No reply within {} ms", args.timeout_ms);
    std::process::exit(1);
}
