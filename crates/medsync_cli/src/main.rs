//! MedSync CLI
//!
//! Runs a replication node and talks to running ones.
//!
//! # Commands
//!
//! - `serve` - Run a node until interrupted
//! - `get` - Fetch a patient record
//! - `send` - Save a record document on a node
//! - `info` - Show a node's status and stored patients
//! - `register` / `unregister` - Manage a node's peers

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MedSync medical record replication node and client.
#[derive(Parser)]
#[command(name = "medsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for fetched records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// XML wire document
    Xml,
    /// JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a node until interrupted
    ///
    /// With none of --socket, --broker or --service-name given, all three
    /// bindings start on their default addresses.
    Serve {
        /// Identifier of this node
        #[arg(long, default_value = "node-1")]
        node_id: String,

        /// Start the socket binding on this address
        #[arg(long)]
        socket: Option<SocketAddr>,

        /// Start the object-broker binding on this address
        #[arg(long)]
        broker: Option<SocketAddr>,

        /// Start the registry binding under this service name
        #[arg(long)]
        service_name: Option<String>,

        /// Name registry to publish in, hosted here if nothing listens on it
        #[arg(long)]
        registry_addr: Option<SocketAddr>,

        /// Directory for cached record documents
        #[arg(long)]
        records_dir: Option<PathBuf>,

        /// Peer to register at startup, as NODE_ID=ENDPOINT (repeatable)
        #[arg(long = "peer", value_parser = commands::serve::parse_peer)]
        peers: Vec<(String, String)>,

        /// Peer push timeout in milliseconds
        #[arg(long, default_value = "5000")]
        peer_timeout_ms: u64,

        /// Seed the sample record
        #[arg(long)]
        seed_sample: bool,

        /// Push to peers one at a time instead of concurrently
        #[arg(long)]
        sequential: bool,
    },

    /// Fetch a patient record
    Get {
        /// Patient identifier
        patient_id: String,

        /// Node endpoint (socket://, broker:// or registry://)
        #[arg(short, long, default_value = "socket://127.0.0.1:8888")]
        endpoint: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "xml")]
        format: Format,
    },

    /// Decode a record document and save it on a node
    Send {
        /// Path to an XML record document
        file: PathBuf,

        /// Node endpoint (socket:// or broker://)
        #[arg(short, long, default_value = "socket://127.0.0.1:8888")]
        endpoint: String,
    },

    /// Show a node's status and stored patients
    Info {
        /// Broker endpoint of the node
        #[arg(short, long, default_value = "broker://127.0.0.1:1050")]
        endpoint: String,
    },

    /// Register a peer on a node
    Register {
        /// Peer node identifier
        node_id: String,

        /// Peer endpoint, e.g. socket://host:port
        peer_endpoint: String,

        /// Broker endpoint of the node
        #[arg(short, long, default_value = "broker://127.0.0.1:1050")]
        endpoint: String,
    },

    /// Remove a peer from a node
    Unregister {
        /// Peer node identifier
        node_id: String,

        /// Broker endpoint of the node
        #[arg(short, long, default_value = "broker://127.0.0.1:1050")]
        endpoint: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            node_id,
            socket,
            broker,
            service_name,
            registry_addr,
            records_dir,
            peers,
            peer_timeout_ms,
            seed_sample,
            sequential,
        } => {
            let options = commands::serve::ServeOptions {
                node_id,
                socket,
                broker,
                service: service_name,
                registry_addr,
                records_dir,
                peers,
                sample: seed_sample,
                peer_timeout_ms,
                sequential,
            };
            commands::serve::run(options).await?;
        }
        Commands::Get {
            patient_id,
            endpoint,
            format,
        } => {
            commands::get::run(&endpoint, &patient_id, format).await?;
        }
        Commands::Send { file, endpoint } => {
            commands::send::run(&endpoint, &file).await?;
        }
        Commands::Info { endpoint } => {
            commands::info::run(&endpoint).await?;
        }
        Commands::Register {
            node_id,
            peer_endpoint,
            endpoint,
        } => {
            commands::peers::register(&endpoint, &node_id, &peer_endpoint).await?;
        }
        Commands::Unregister { node_id, endpoint } => {
            commands::peers::unregister(&endpoint, &node_id).await?;
        }
    }

    Ok(())
}
