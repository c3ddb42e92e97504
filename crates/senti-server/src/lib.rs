//! Senti server - WebSocket gateway plus HTTP status endpoints

mod app;
pub mod http;
pub mod logging;

pub use app::{build_context, gateway_config, router_options, run, Overrides};
