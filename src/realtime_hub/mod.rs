//! RealtimeHub - WebSocket fan-out to live viewers
//!
//! ## Responsibilities
//!
//! - Subscriber connection registry
//! - Per-cycle broadcast of the composite sensor update envelope
//! - Failure isolation: a dead subscriber is dropped without affecting
//!   delivery to any other subscriber
//!
//! Broadcast is two-phase: sends happen under the read lock while failed
//! connection ids are collected, then removal happens under the write
//! lock. Membership only changes via register, unregister and failed
//! sends.

use crate::alerts::Alert;
use crate::sensors::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The per-cycle composite message every subscriber receives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorUpdate {
    /// Fixed discriminator: always "sensor_update"
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub data: MetricsSnapshot,
    pub alerts: Vec<Alert>,
}

impl SensorUpdate {
    pub fn new(data: MetricsSnapshot, alerts: Vec<Alert>) -> Self {
        Self {
            kind: "sensor_update".to_string(),
            timestamp: data.timestamp.clone(),
            data,
            alerts,
        }
    }
}

/// One live subscriber connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Subscriber connected");

        (id, rx)
    }

    /// Unregister a subscriber (idempotent)
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Subscriber disconnected");
        }
    }

    /// Broadcast one update to all current subscribers
    ///
    /// Every subscriber whose delivery fails is removed; all others still
    /// receive the message.
    pub async fn broadcast(&self, update: &SensorUpdate) {
        let json = match serde_json::to_string(update) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize update");
                return;
            }
        };

        let mut failed = Vec::new();
        {
            let connections = self.connections.read().await;
            tracing::debug!(
                subscribers = connections.len(),
                alerts = update.alerts.len(),
                "Broadcasting sensor update"
            );
            for conn in connections.values() {
                if conn.tx.send(json.clone()).is_err() {
                    failed.push(conn.id);
                }
            }
        }

        if !failed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in failed {
                if connections.remove(&id).is_some() {
                    self.connection_count.fetch_sub(1, Ordering::Relaxed);
                    tracing::warn!(connection_id = %id, "Dropped unreachable subscriber");
                }
            }
        }
    }

    /// Current subscriber count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
