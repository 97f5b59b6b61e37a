//! Socket Proxy for drivegate
//!
//! Unix socket server that lets local tool runtimes invoke Google Drive
//! operations through the daemon's service-account credentials.
//!
//! Protocol: JSON-RPC 2.0 over a Unix socket at `~/.drivegate/drivegate.sock`

pub mod handlers;
pub mod protocol;
pub mod server;

use std::sync::Arc;
use tokio::sync::RwLock;

pub use server::ProxyServer;

/// Server state shared across connections
pub struct ProxyState {
    /// Total connections accepted
    pub connection_count: RwLock<u64>,
    /// Connections currently open
    pub active_connections: RwLock<u32>,
}

impl ProxyState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Default for ProxyState {
    fn default() -> Self {
        Self {
            connection_count: RwLock::new(0),
            active_connections: RwLock::new(0),
        }
    }
}
