//! Connection handles
//!
//! A registered client connection and the sink frames are written to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{Sink, SinkExt};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

/// Write half of a client transport
#[async_trait]
pub trait FrameSink: Send {
    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the transport, optionally with a close code. Best effort.
    async fn shutdown(&mut self, code: Option<u16>);
}

/// [`FrameSink`] over the write half of a WebSocket stream
pub struct WsSink<S> {
    inner: S,
}

impl<S> WsSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin + Send,
{
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn shutdown(&mut self, code: Option<u16>) {
        if let Some(code) = code {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: Cow::Borrowed(""),
            };
            let _ = self.inner.send(Message::Close(Some(frame))).await;
        }
        let _ = SinkExt::close(&mut self.inner).await;
    }
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

/// A registered connection
pub struct ConnectionHandle {
    pub id: String,
    pub peer: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
    state: Mutex<ConnectionState>,
    /// Serializes writes so frames never interleave
    sink: tokio::sync::Mutex<Box<dyn FrameSink>>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("connected_at", &self.connected_at)
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(id: impl Into<String>, peer: Option<SocketAddr>, sink: Box<dyn FrameSink>) -> Self {
        Self {
            id: id.into(),
            peer,
            connected_at: Utc::now(),
            state: Mutex::new(ConnectionState::Open),
            sink: tokio::sync::Mutex::new(sink),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Write one text frame; fails with [`TransportError::Closed`] once closing
    pub async fn send_text(&self, text: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        sink.send_text(text).await
    }

    /// Move to `Closing`. Returns false if the connection was already closing.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if *state != ConnectionState::Open {
            return false;
        }
        *state = ConnectionState::Closing;
        true
    }

    /// Shut the transport down and mark the connection closed
    pub(crate) async fn finish_close(&self, code: Option<u16>) {
        self.sink.lock().await.shutdown(code).await;
        *self.state.lock() = ConnectionState::Closed;
    }
}

/// Transport-level errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("Connection closed")]
    Closed,
}
