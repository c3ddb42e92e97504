//! Gateway main structure
//!
//! The WebSocket server that accepts clients and runs their exchanges.

use futures_util::{Stream, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{accept_async, accept_hdr_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::connection::{FrameSink, WsSink};
use crate::context::GatewayContext;
use crate::protocol::{OutboundFrame, ValidationError};
use crate::router::ExchangeOutcome;

/// Server shutting down
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// An exchange hit an unexpected fault
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
/// Connection limit reached
pub const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address (e.g., "0.0.0.0:8765")
    pub bind: String,
    /// Accepted WebSocket paths
    pub paths: Vec<String>,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Allowed `Origin` values; `"*"` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8765".to_string(),
            paths: vec!["/".to_string(), "/ai".to_string()],
            max_connections: 1000,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

impl GatewayConfig {
    fn accepts_path(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Requests without an `Origin` header (native clients) are always accepted
    fn accepts_origin(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed == origin),
        }
    }

    /// Handshake check: unknown paths get 404, disallowed origins 403
    fn check_handshake(&self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        if !self.accepts_path(path) {
            debug!("rejecting handshake for unknown path {}", path);
            return Err(error_response(StatusCode::NOT_FOUND, "Not Found"));
        }

        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if !self.accepts_origin(origin) {
            warn!("rejecting handshake from origin {:?}", origin);
            return Err(error_response(StatusCode::FORBIDDEN, "Origin not allowed"));
        }
        Ok(response)
    }
}

fn error_response(status: StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_string()));
    *response.status_mut() = status;
    response
}

/// The main Gateway server
#[derive(Debug, Clone)]
pub struct Gateway {
    config: GatewayConfig,
    context: GatewayContext,
    shutdown: CancellationToken,
    /// One permit per connection, taken at accept time
    slots: Arc<Semaphore>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, context: GatewayContext) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config,
            context,
            shutdown: CancellationToken::new(),
            slots,
        }
    }

    /// Stop accepting when `token` is cancelled; open connections get 1001
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn context(&self) -> &GatewayContext {
        &self.context
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind to the configured address and serve until shutdown
    pub async fn run(&self) -> Result<(), GatewayError> {
        let addr: SocketAddr = self.config.bind.parse()?;
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve an already-bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        info!(
            "Gateway listening on ws://{} (paths: {:?})",
            listener.local_addr()?,
            self.config.paths
        );

        loop {
            let (stream, peer) = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Gateway shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept failed: {}", e);
                        continue;
                    }
                },
            };
            debug!("New connection from {}", peer);

            let gateway = self.clone();
            let permit = match Arc::clone(&self.slots).try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!("Connection limit reached, rejecting {}", peer);
                    tokio::spawn(async move {
                        if let Err(e) = gateway.reject_connection(stream).await {
                            debug!("failed to reject {}: {}", peer, e);
                        }
                    });
                    continue;
                }
            };

            tokio::spawn(async move {
                // slot is released once the connection is fully torn down
                let _permit = permit;
                if let Err(e) = gateway.handle_connection(stream, peer).await {
                    warn!("Connection error for {}: {}", peer, e);
                }
            });
        }
    }

    /// Tell the client we are full, then close with 1013
    async fn reject_connection(&self, stream: TcpStream) -> Result<(), GatewayError> {
        let ws_stream = accept_async(stream).await?;
        let mut sink = WsSink::new(ws_stream);
        let frame = OutboundFrame::error("Server at capacity");
        sink.send_text(frame.to_json()?).await.ok();
        sink.shutdown(Some(CLOSE_TRY_AGAIN_LATER)).await;
        Ok(())
    }

    /// Handle a WebSocket connection from handshake to cleanup
    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), GatewayError> {
        let ws_stream = accept_hdr_async(stream, |request: &Request, response: Response| {
            self.config.check_handshake(request, response)
        })
        .await?;

        let (sink, source) = ws_stream.split();
        let sessions = &self.context.sessions;
        let conn_id = sessions.register(Box::new(WsSink::new(sink)), Some(peer));

        let span = info_span!("connection", id = %conn_id, %peer);
        let close_code = self.read_loop(&conn_id, source).instrument(span).await;

        match close_code {
            Some(code) => sessions.close(&conn_id, code).await,
            None => sessions.unregister(&conn_id).await,
        };
        Ok(())
    }

    /// Read frames until the client leaves. Returns the close code to send, if any.
    async fn read_loop<S>(&self, conn_id: &str, mut source: S) -> Option<u16>
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let mut exchanges: JoinSet<ExchangeOutcome> = JoinSet::new();

        let close_code = loop {
            // a failed write unregisters the connection
            if !self.context.sessions.contains(conn_id) {
                debug!("connection unregistered, stopping reads");
                break None;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break Some(CLOSE_GOING_AWAY),

                Some(joined) = exchanges.join_next(), if !exchanges.is_empty() => match joined {
                    Ok(outcome) => debug!(?outcome, "exchange finished"),
                    Err(e) if e.is_panic() => {
                        error!("exchange panicked: {}", e);
                        break Some(CLOSE_INTERNAL_ERROR);
                    }
                    Err(_) => {}
                },

                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.spawn_exchange(&mut exchanges, conn_id, text),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => self.spawn_exchange(&mut exchanges, conn_id, text),
                        Err(_) => {
                            let frame = OutboundFrame::error(ValidationError::InvalidJson.to_string());
                            self.context.sessions.send(conn_id, &frame).await;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("client closed connection");
                        break None;
                    }
                    // ping/pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("read error: {}", e);
                        break None;
                    }
                },
            }
        };

        // Abort in-flight exchanges; their provider streams are dropped with them
        exchanges.shutdown().await;
        close_code
    }

    fn spawn_exchange(&self, exchanges: &mut JoinSet<ExchangeOutcome>, conn_id: &str, text: String) {
        debug!(bytes = text.len(), "frame received");
        let router = self.context.router.clone();
        let conn_id = conn_id.to_string();
        exchanges.spawn(
            async move { router.handle(&conn_id, &text).await }.in_current_span(),
        );
    }
}

impl std::fmt::Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gateway({})", self.config.bind)
    }
}

/// Gateway-related errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}
