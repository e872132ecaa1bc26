use std::net::{IpAddr, TcpListener};
use std::thread;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use ofp_l2switch::learning_switch::{ConnectionId, LearningConfig};
use ofp_l2switch::ofp_controller::openflow0x01::OF0x01Controller;
use ofp_l2switch::ofp_controller::OfpController;
use ofp_l2switch::openflow0x01::DEFAULT_PRIORITY;
use ofp_l2switch::registry::ControllerRegistry;

/// OpenFlow 1.0 learning-switch controller for any number of switches.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on for switch connections.
    #[arg(long, default_value = "127.0.0.1")]
    address: IpAddr,

    #[arg(long, default_value_t = 6633)]
    port: u16,

    /// Idle timeout, in seconds, of installed flows.
    #[arg(long, default_value_t = 10)]
    idle_timeout: u16,

    /// Hard timeout, in seconds, of installed flows.
    #[arg(long, default_value_t = 30)]
    hard_timeout: u16,

    #[arg(long, default_value_t = DEFAULT_PRIORITY)]
    priority: u16,
}

fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging().map_err(|e| e as Box<dyn std::error::Error>)?;

    let config = LearningConfig {
        idle_timeout: args.idle_timeout,
        hard_timeout: args.hard_timeout,
        priority: args.priority,
    };
    let listener = TcpListener::bind((args.address, args.port))?;
    info!(addr = %listener.local_addr()?, ?config, "listening for switches");

    let (tx, rx) = crossbeam_channel::unbounded();
    let dispatcher = thread::spawn(move || {
        let mut registry = ControllerRegistry::new(config);
        registry.run(&rx);
    });

    let mut next_id: ConnectionId = 0;
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                next_id += 1;
                let id = next_id;
                debug!(connection = id, peer = ?stream.peer_addr().ok(), "accepted");
                let events = tx.clone();
                thread::spawn(move || {
                    if let Err(e) = OF0x01Controller::handle_client_connected(id, stream, events) {
                        error!(connection = id, error = %e, "switch session ended");
                    }
                });
            }
            Err(e) => error!(error = %e, "connection failed"),
        }
    }

    drop(tx);
    dispatcher
        .join()
        .map_err(|_| "dispatcher thread panicked")?;
    Ok(())
}
