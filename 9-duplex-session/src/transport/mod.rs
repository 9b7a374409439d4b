//! Transport channels the session runs over.
//!
//! A [`TransportChannel`] is an already-established, bidirectional message
//! pipe. The session only ever has one task calling [`TransportChannel::send`]
//! and one task calling [`TransportChannel::receive`], but implementations
//! still guard each direction with its own lock so overlapping calls on the
//! same direction are serialised instead of interleaved.

use std::{fmt, io, str::FromStr, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::message::Message;

pub mod tcp;
pub mod ws;

pub use tcp::TcpChannel;
pub use ws::WsChannel;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[async_trait]
pub trait TransportChannel: Send + Sync {
    /// Transmits one message. Messages go out in call order.
    async fn send(&self, message: Message) -> Result<(), TransportError>;

    /// Waits for the next inbound message.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection cleanly.
    /// Must be cancel safe: dropping the future loses no inbound data.
    async fn receive(&self) -> Result<Option<Message>, TransportError>;

    /// Closes the outbound direction and releases the connection.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Where to connect to, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Raw TCP, `host:port`.
    Tcp(String),
    /// WebSocket URL, `ws://` or `wss://`.
    WebSocket(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported target '{0}': expected ws://, wss://, tcp:// or host:port")]
pub struct InvalidTarget(String);

impl FromStr for Target {
    type Err = InvalidTarget;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.starts_with("ws://") || raw.starts_with("wss://") {
            return Ok(Target::WebSocket(raw.to_string()));
        }

        let authority = raw.strip_prefix("tcp://").unwrap_or(raw);
        if authority.contains("://") || !has_port(authority) {
            return Err(InvalidTarget(raw.to_string()));
        }

        Ok(Target::Tcp(authority.trim_end_matches('/').to_string()))
    }
}

fn has_port(authority: &str) -> bool {
    authority
        .trim_end_matches('/')
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tcp(addr) => write!(f, "tcp://{addr}"),
            Target::WebSocket(url) => f.write_str(url),
        }
    }
}

/// Performs the transport handshake for `target` and hands back a ready channel.
pub async fn connect(target: &Target) -> Result<Arc<dyn TransportChannel>, TransportError> {
    let channel: Arc<dyn TransportChannel> = match target {
        Target::Tcp(addr) => Arc::new(TcpChannel::connect(addr).await?),
        Target::WebSocket(url) => Arc::new(WsChannel::connect(url).await?),
    };
    info!(%target, "connected");
    Ok(channel)
}
