use std::{io, sync::Arc};

use async_trait::async_trait;
use tokio::{select, sync::watch};
use tracing::{debug, warn};

use crate::{
    message::Message,
    session::{TerminationSignal, cancelled},
    transport::TransportChannel,
};

/// Destination for inbound messages, typically the terminal.
#[async_trait]
pub trait OutputSink: Send {
    async fn write(&mut self, message: &Message) -> io::Result<()>;
}

/// Pulls inbound messages off `channel` and hands them to `sink` in arrival order.
///
/// Returns the terminal signal, or `None` when stopped through `cancel`.
/// Sink failures are logged and skipped so a rendering glitch never drops
/// the connection.
pub async fn run<O>(
    channel: Arc<dyn TransportChannel>,
    mut sink: O,
    mut cancel: watch::Receiver<bool>,
) -> Option<TerminationSignal>
where
    O: OutputSink,
{
    let mut delivered: u64 = 0;
    loop {
        let received = select! {
            _ = cancelled(&mut cancel) => {
                debug!(delivered, "receiver cancelled");
                return None;
            }
            received = channel.receive() => received,
        };

        match received {
            Ok(Some(message)) => {
                delivered += 1;
                if let Err(error) = sink.write(&message).await {
                    warn!(?error, "failed to render inbound message");
                }
            }
            Ok(None) => {
                debug!(delivered, "peer closed the channel");
                return Some(TerminationSignal::PeerClosed);
            }
            Err(err) => {
                warn!(error = %err, "receive failed");
                return Some(TerminationSignal::TransportError(err.to_string()));
            }
        }
    }
}
