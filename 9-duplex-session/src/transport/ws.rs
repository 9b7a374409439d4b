use async_trait::async_trait;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::Mutex,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::debug;

use super::{TransportChannel, TransportError};
use crate::message::Message;

/// WebSocket connection split into independently locked halves.
pub struct WsChannel<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl WsChannel<MaybeTlsStream<TcpStream>> {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (socket, response) = connect_async(url).await?;
        debug!(status = %response.status(), "websocket upgrade accepted");
        Ok(Self::new(socket))
    }
}

impl<S> WsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(socket: WebSocketStream<S>) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }
}

#[async_trait]
impl<S> TransportChannel for WsChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        let frame = match message {
            Message::Text(text) => WsMessage::text(text),
            Message::Binary(data) => WsMessage::binary(data),
        };
        self.sink.lock().await.send(frame).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Message>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Ok(Some(Message::Text(text.as_str().to_owned())));
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    return Ok(Some(Message::Binary(data.to_vec())));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!(?frame, "peer sent close frame");
                    return Ok(None);
                }
                // Ping, pong and raw frames carry no user payload.
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    return Ok(None);
                }
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        match self.sink.lock().await.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
