use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

use crate::{echo::Protocol, transport::Target};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a peer and exchange messages until either side leaves.
    Client(ClientArgs),
    /// Run a peer that echoes every message back to its sender.
    Echo(EchoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Peer to connect to: ws://, wss://, tcp://host:port or host:port.
    #[arg(default_value = "ws://localhost:8080")]
    pub target: Target,
}

#[derive(Args, Debug, Clone)]
pub struct EchoArgs {
    /// Socket address the echo peer should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Framing the echo peer speaks.
    #[arg(long, value_enum, default_value_t = Protocol::Ws)]
    pub protocol: Protocol,
}
