//! Senti Gateway - WebSocket front end for LLM chat
//!
//! Accepts client connections, validates each inbound frame, routes it to a
//! provider adapter and streams the reply back as JSON frames.

mod connection;
mod context;
mod gateway;
mod protocol;
mod router;
mod session;

pub use connection::{ConnectionHandle, ConnectionState, FrameSink, TransportError, WsSink};
pub use context::{GatewayContext, GatewayStatus};
pub use gateway::{Gateway, GatewayConfig, GatewayError, CLOSE_GOING_AWAY, CLOSE_INTERNAL_ERROR, CLOSE_TRY_AGAIN_LATER};
pub use protocol::{parse_inbound, InboundMessage, OutboundFrame, ValidationError};
pub use router::{ExchangeOutcome, RequestRouter, RouterOptions};
pub use session::{SendOutcome, SessionManager};
