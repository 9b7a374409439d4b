use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};
use tracing::debug;

use super::{TransportChannel, TransportError};
use crate::message::Message;

/// Largest payload handed out by a single `receive`.
const READ_CHUNK: usize = 1024;

/// Raw TCP stream; every successful read is one inbound message.
///
/// A UTF-8 sequence cut off at the end of a read is held back and joined
/// with the next read, so text is never split mid-character.
pub struct TcpChannel {
    reader: Mutex<ReadState>,
    writer: Mutex<OwnedWriteHalf>,
    peer: Option<SocketAddr>,
}

impl TcpChannel {
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(ReadState {
                half: reader,
                partial: Vec::new(),
            }),
            writer: Mutex::new(writer),
            peer,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

struct ReadState {
    half: OwnedReadHalf,
    partial: Vec<u8>,
}

/// Splits off everything up to a trailing incomplete UTF-8 sequence.
///
/// Returns `None` while `pending` holds only the start of one character.
fn take_message(pending: &mut Vec<u8>) -> Option<Message> {
    let complete = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        // Not text at all; keep it whole as binary.
        Err(_) => pending.len(),
    };
    if complete == 0 {
        return None;
    }
    let rest = pending.split_off(complete);
    Some(Message::from_bytes(std::mem::replace(pending, rest)))
}

#[async_trait]
impl TransportChannel for TcpChannel {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.write_all(message.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Message>, TransportError> {
        let mut state = self.reader.lock().await;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let read = state.half.read(&mut buf).await?;
            if read == 0 {
                if state.partial.is_empty() {
                    debug!(peer = ?self.peer, "tcp peer closed the stream");
                    return Ok(None);
                }
                // The stream ended inside a character; hand out what is left.
                return Ok(Some(Message::Binary(std::mem::take(&mut state.partial))));
            }
            state.partial.extend_from_slice(&buf[..read]);
            if let Some(message) = take_message(&mut state.partial) {
                return Ok(Some(message));
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}
