//! Shared gateway state
//!
//! Built once at startup and handed to both the WebSocket gateway and the
//! HTTP status endpoints.

use senti_llm::ProviderRegistry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::router::{RequestRouter, RouterOptions};
use crate::session::SessionManager;

#[derive(Debug, Clone)]
pub struct GatewayContext {
    pub sessions: SessionManager,
    pub providers: Arc<ProviderRegistry>,
    pub router: RequestRouter,
}

impl GatewayContext {
    pub fn new(providers: ProviderRegistry, options: RouterOptions) -> Self {
        let sessions = SessionManager::new();
        let providers = Arc::new(providers);
        let router = RequestRouter::new(sessions.clone(), Arc::clone(&providers), options);
        Self {
            sessions,
            providers,
            router,
        }
    }

    /// Snapshot for the status endpoint
    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            active_connections: self.sessions.count(),
            providers: self.providers.configured(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
    pub active_connections: usize,
    /// Provider name -> usable
    pub providers: BTreeMap<String, bool>,
}
