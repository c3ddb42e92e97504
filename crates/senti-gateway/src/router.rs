//! Request routing
//!
//! Turns one inbound frame into provider calls and outbound frames.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::StreamExt;
use senti_core::ChatRequest;
use senti_llm::{LLMError, ProviderAdapter, ProviderRegistry, TextStream};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::protocol::{parse_inbound, InboundMessage, OutboundFrame, ValidationError};
use crate::session::SessionManager;

/// How one exchange ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Validation failed; no provider was called
    Rejected,
    Completed,
    /// The provider failed and an error frame was sent
    Failed,
    /// The client went away mid-exchange
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Attach the classified sentiment as a system context line
    pub sentiment_context: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            sentiment_context: true,
        }
    }
}

/// Routes client requests to provider adapters
#[derive(Debug, Clone)]
pub struct RequestRouter {
    sessions: SessionManager,
    providers: Arc<ProviderRegistry>,
    options: RouterOptions,
}

impl RequestRouter {
    pub fn new(
        sessions: SessionManager,
        providers: Arc<ProviderRegistry>,
        options: RouterOptions,
    ) -> Self {
        Self {
            sessions,
            providers,
            options,
        }
    }

    /// Handle one raw text frame from connection `conn_id`.
    ///
    /// Exactly one terminal frame is sent unless the client goes away first.
    pub async fn handle(&self, conn_id: &str, raw: &str) -> ExchangeOutcome {
        let span = info_span!(
            "exchange",
            id = %Uuid::new_v4(),
            connection = %conn_id,
            provider = tracing::field::Empty,
            stream = tracing::field::Empty,
        );
        self.handle_inner(conn_id, raw).instrument(span).await
    }

    async fn handle_inner(&self, conn_id: &str, raw: &str) -> ExchangeOutcome {
        let message = match parse_inbound(raw) {
            Ok(message) => message,
            Err(e) => return self.reject(conn_id, e).await,
        };

        let adapter = self.providers.resolve(message.provider_name());
        let span = tracing::Span::current();
        span.record("provider", adapter.provider_id());
        span.record("stream", message.stream);
        debug!(
            legacy = message.is_legacy_chat(),
            platform = message.platform.as_deref().unwrap_or("unknown"),
            "dispatching request"
        );

        if let Some(image) = message.image_payload() {
            let bytes = match decode_image(image) {
                Ok(bytes) => bytes,
                Err(e) => return self.reject(conn_id, e).await,
            };
            return self.analyze_image(conn_id, &message, adapter, &bytes).await;
        }

        let request = self.build_request(&message);
        if message.stream && !message.is_legacy_chat() && adapter.supports_streaming() {
            self.stream(conn_id, &message, adapter, &request).await
        } else {
            self.single_shot(conn_id, &message, adapter, &request).await
        }
    }

    fn build_request(&self, message: &InboundMessage) -> ChatRequest {
        let mut request = ChatRequest::new(message.text());
        if let Some(history) = &message.history {
            request = request.with_history(history.clone());
        }
        if let Some(model) = message.model_override().filter(|m| !m.is_empty()) {
            request = request.with_model(model);
        }
        if self.options.sentiment_context {
            let sentiment = senti_sentiment::classify(message.text());
            debug!(sentiment = sentiment.as_str(), "classified message");
            request = request.with_sentiment(sentiment);
        }
        request
    }

    async fn reject(&self, conn_id: &str, error: ValidationError) -> ExchangeOutcome {
        debug!("rejected frame: {}", error);
        self.sessions
            .send(conn_id, &OutboundFrame::error(error.to_string()))
            .await;
        ExchangeOutcome::Rejected
    }

    async fn stream(
        &self,
        conn_id: &str,
        message: &InboundMessage,
        adapter: Arc<dyn ProviderAdapter>,
        request: &ChatRequest,
    ) -> ExchangeOutcome {
        let name = adapter.metadata().name.clone();
        match adapter.generate_stream(request).await {
            Ok(stream) => self.pump(conn_id, &name, stream).await,
            Err(LLMError::Unsupported(reason)) => {
                debug!("streaming unavailable ({}), falling back", reason);
                self.single_shot(conn_id, message, adapter, request).await
            }
            Err(e) => {
                warn!("{} streaming failed: {}", name, e);
                let frame = OutboundFrame::error(format!("{} streaming error: {}", name, e));
                self.finish(conn_id, frame, ExchangeOutcome::Failed).await
            }
        }
    }

    async fn pump(&self, conn_id: &str, name: &str, mut stream: TextStream) -> ExchangeOutcome {
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) if chunk.is_empty() => continue,
                Ok(chunk) => {
                    let outcome = self
                        .sessions
                        .send(conn_id, &OutboundFrame::stream_chunk(chunk))
                        .await;
                    if !outcome.is_delivered() {
                        debug!("client gone, dropping stream");
                        return ExchangeOutcome::Abandoned;
                    }
                }
                Err(e) => {
                    warn!("{} stream failed: {}", name, e);
                    let frame = OutboundFrame::error(format!("{} streaming error: {}", name, e));
                    return self.finish(conn_id, frame, ExchangeOutcome::Failed).await;
                }
            }
        }
        self.finish(conn_id, OutboundFrame::stream_done(), ExchangeOutcome::Completed)
            .await
    }

    async fn single_shot(
        &self,
        conn_id: &str,
        message: &InboundMessage,
        adapter: Arc<dyn ProviderAdapter>,
        request: &ChatRequest,
    ) -> ExchangeOutcome {
        let name = &adapter.metadata().name;
        match adapter.generate(request).await {
            Ok(text) => {
                let frame = reply_frame(message, adapter.as_ref(), text);
                self.finish(conn_id, frame, ExchangeOutcome::Completed).await
            }
            Err(e) => {
                warn!("{} generation failed: {}", name, e);
                let frame = OutboundFrame::error(format!("{} generation error: {}", name, e));
                self.finish(conn_id, frame, ExchangeOutcome::Failed).await
            }
        }
    }

    async fn analyze_image(
        &self,
        conn_id: &str,
        message: &InboundMessage,
        adapter: Arc<dyn ProviderAdapter>,
        image: &[u8],
    ) -> ExchangeOutcome {
        let name = &adapter.metadata().name;
        match adapter.analyze_image(image).await {
            Ok(text) => {
                let frame = reply_frame(message, adapter.as_ref(), text);
                self.finish(conn_id, frame, ExchangeOutcome::Completed).await
            }
            Err(e) => {
                warn!("{} image analysis failed: {}", name, e);
                let frame = OutboundFrame::error(format!("{} image analysis error: {}", name, e));
                self.finish(conn_id, frame, ExchangeOutcome::Failed).await
            }
        }
    }

    /// Send the terminal frame of an exchange
    async fn finish(
        &self,
        conn_id: &str,
        frame: OutboundFrame,
        outcome: ExchangeOutcome,
    ) -> ExchangeOutcome {
        debug_assert!(frame.is_terminal(), "non-terminal frame ends exchange");
        if self.sessions.send(conn_id, &frame).await.is_delivered() {
            outcome
        } else {
            ExchangeOutcome::Abandoned
        }
    }
}

fn reply_frame(
    message: &InboundMessage,
    adapter: &dyn ProviderAdapter,
    text: String,
) -> OutboundFrame {
    if message.is_legacy_chat() {
        OutboundFrame::chat_response(text, adapter.provider_id())
    } else {
        OutboundFrame::response(text)
    }
}

/// Decode a base64 image, accepting a `data:<mime>;base64,` prefix
fn decode_image(payload: &str) -> Result<Vec<u8>, ValidationError> {
    let payload = payload.trim();
    let data = match payload.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or(ValidationError::InvalidImage)?,
        None => payload,
    };
    match STANDARD.decode(data) {
        Ok(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(ValidationError::InvalidImage),
    }
}
