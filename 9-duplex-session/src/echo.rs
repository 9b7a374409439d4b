use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};

use crate::transport::{TcpChannel, TransportChannel, WsChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// Raw TCP byte echo.
    Tcp,
    /// WebSocket frame echo.
    Ws,
}

/// Peer that sends every inbound message straight back on the same connection.
pub struct EchoServer {
    listener: TcpListener,
    protocol: Protocol,
}

impl EchoServer {
    pub fn new(listener: TcpListener, protocol: Protocol) -> Self {
        Self { listener, protocol }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let EchoServer { listener, protocol } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("echo peer shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, protocol);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(result: std::io::Result<(TcpStream, SocketAddr)>, protocol: Protocol) {
    match result {
        Ok((stream, peer)) => spawn_connection_handler(stream, peer, protocol),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(stream: TcpStream, peer: SocketAddr, protocol: Protocol) {
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, peer, protocol).await {
            warn!(peer = %peer, error = ?err, "echo connection closed with error");
        }
    });
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, protocol: Protocol) -> Result<()> {
    debug!(peer = %peer, ?protocol, "peer connected");
    match protocol {
        Protocol::Tcp => echo(&TcpChannel::from_stream(stream)).await?,
        Protocol::Ws => {
            let socket = accept_async(stream)
                .await
                .with_context(|| format!("websocket handshake with {peer} failed"))?;
            echo(&WsChannel::new(socket)).await?;
        }
    }
    debug!(peer = %peer, "peer disconnected");
    Ok(())
}

async fn echo(channel: &dyn TransportChannel) -> Result<()> {
    let mut echoed: u64 = 0;
    while let Some(message) = channel.receive().await? {
        channel.send(message).await?;
        echoed += 1;
    }
    debug!(echoed, "echo finished");
    channel.close().await?;
    Ok(())
}
