use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};
use tracing::trace;

use crate::domain::WsRequest;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on TCP connect + TLS + WebSocket upgrade
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport failure. Always retried by the connector.
#[derive(Error, Debug)]
pub enum WsError {
    #[error("Connection error: {0}")]
    Connection(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
}

/// One inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    /// Ping/pong; carries no data but proves the link is alive
    Heartbeat,
    Closed,
}

/// WebSocket connector
/// Infrastructure component - opens sockets and hands back split halves
#[derive(Debug, Clone)]
pub struct WsClient {
    connect_timeout: Duration,
}

impl Default for WsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WsClient {
    pub fn new() -> Self {
        WsClient {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect to `url` and split the socket into writer and reader halves.
    ///
    /// A peer that accepts TCP but never completes the handshake yields
    /// [`WsError::HandshakeTimeout`].
    pub async fn connect(&self, url: &str) -> Result<(WsWriter, WsReader), WsError> {
        url::Url::parse(url).map_err(|e| WsError::InvalidUrl(format!("{url}: {e}")))?;
        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| WsError::HandshakeTimeout(self.connect_timeout))??;
        let (write, read) = ws_stream.split();
        Ok((WsWriter { sink: write }, WsReader { stream: read }))
    }
}

/// Write half: serialises control frames onto the socket
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl WsWriter {
    pub async fn send(&mut self, request: &WsRequest) -> Result<(), WsError> {
        let json = serde_json::to_string(request)?;
        trace!(frame = %json, "sending control frame");
        self.sink.send(Message::Text(json.into())).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), WsError> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Read half: yields text frames, heartbeats and close notifications
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Next transport event; `None` once the stream is exhausted
    pub async fn next_frame(&mut self) -> Option<Result<WsFrame, WsError>> {
        loop {
            let msg = match self.stream.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(e.into())),
            };
            match msg {
                Message::Text(text) => return Some(Ok(WsFrame::Text(text.to_string()))),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(WsFrame::Text(text))),
                    Err(_) => trace!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                },
                Message::Ping(_) | Message::Pong(_) => return Some(Ok(WsFrame::Heartbeat)),
                Message::Close(frame) => {
                    trace!(?frame, "received close frame");
                    return Some(Ok(WsFrame::Closed));
                }
                Message::Frame(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let client = WsClient::new();
        let err = client.connect("not a url").await.err();
        assert!(matches!(err, Some(WsError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WsClient::new();
        let err = client.connect(&format!("ws://{addr}/ws")).await.err();
        assert!(matches!(err, Some(WsError::Connection(_))));
    }

    #[tokio::test]
    async fn test_connect_times_out_when_upgrade_never_answers() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            // accept and sit on the socket without answering the upgrade
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let client = WsClient::new().with_connect_timeout(Duration::from_millis(100));
        let err = client.connect(&format!("ws://{addr}/ws")).await.err();
        assert!(matches!(err, Some(WsError::HandshakeTimeout(d)) if d == Duration::from_millis(100)));
        hold.abort();
    }
}
