//! Session management
//!
//! Tracks open client connections and delivers frames to them.

use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionHandle, FrameSink, TransportError};
use crate::protocol::OutboundFrame;

/// Result of [`SessionManager::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// Connection unknown or no longer open
    Skipped,
    /// Write failed; the connection has been unregistered
    Failed,
}

impl SendOutcome {
    pub fn is_delivered(self) -> bool {
        self == SendOutcome::Delivered
    }
}

/// Manages all active connections
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    connections: Arc<DashMap<String, Arc<ConnectionHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted transport and return its connection id.
    ///
    /// Ids come from a monotonic counter and are never reused.
    pub fn register(&self, sink: Box<dyn FrameSink>, peer: Option<SocketAddr>) -> String {
        let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let handle = Arc::new(ConnectionHandle::new(id.clone(), peer, sink));
        self.connections.insert(id.clone(), handle);
        info!(connection = %id, ?peer, active = self.count(), "client connected");
        id
    }

    /// Remove a connection and close its transport. Idempotent.
    pub async fn unregister(&self, id: &str) -> bool {
        self.remove(id, None).await
    }

    /// Like [`unregister`](Self::unregister), sending a close frame with `code`
    pub async fn close(&self, id: &str, code: u16) -> bool {
        self.remove(id, Some(code)).await
    }

    async fn remove(&self, id: &str, code: Option<u16>) -> bool {
        let Some((_, handle)) = self.connections.remove(id) else {
            return false;
        };
        if handle.begin_close() {
            handle.finish_close(code).await;
        }
        info!(connection = %id, ?code, active = self.count(), "client disconnected");
        true
    }

    /// Serialize `frame` and write it to connection `id`
    pub async fn send(&self, id: &str, frame: &OutboundFrame) -> SendOutcome {
        // Clone out of the map so no shard lock is held across the write
        let Some(handle) = self.get(id) else {
            debug!(connection = %id, "send to unknown connection skipped");
            return SendOutcome::Skipped;
        };

        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(connection = %id, "failed to serialize frame: {}", e);
                return SendOutcome::Skipped;
            }
        };

        match handle.send_text(text).await {
            Ok(()) => SendOutcome::Delivered,
            Err(TransportError::Closed) => SendOutcome::Skipped,
            Err(e) => {
                warn!(connection = %id, "send failed: {}", e);
                self.unregister(id).await;
                SendOutcome::Failed
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }
}
