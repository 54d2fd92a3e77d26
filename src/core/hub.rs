//! Process-wide request registry and subscription bus. Pipeline workers
//! push snapshots in; subscribers watch one request (or all of them)
//! without ever being able to block a worker.

use std::collections::HashMap;

use anyhow::{Result, bail};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};
use tracing::warn;

use crate::core::pipeline::types::Request;

/// Per-subscriber buffer. A sink that falls this far behind starts
/// losing intermediate snapshots; the terminal one still lands once the
/// subscriber drains.
const SINK_CAPACITY: usize = 32;
const GLOBAL_CAPACITY: usize = 64;

pub struct RequestHub {
    requests: RwLock<HashMap<String, Request>>,
    sinks: Mutex<HashMap<String, Vec<mpsc::Sender<Request>>>>,
    global_tx: broadcast::Sender<Request>,
}

impl Default for RequestHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestHub {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(GLOBAL_CAPACITY);
        Self {
            requests: RwLock::new(HashMap::new()),
            sinks: Mutex::new(HashMap::new()),
            global_tx,
        }
    }

    pub async fn register(&self, request: Request) -> Result<()> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            bail!("request {} already registered", request.id);
        }
        requests.insert(request.id.clone(), request);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<Request> {
        self.requests.read().await.get(id).cloned()
    }

    /// Every known request, newest first.
    pub async fn list(&self) -> Vec<Request> {
        let mut all: Vec<Request> = self.requests.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Drop a request from the registry once its retention is over.
    pub async fn remove(&self, id: &str) -> bool {
        self.sinks.lock().await.remove(id);
        self.requests.write().await.remove(id).is_some()
    }

    /// Watch one request. Snapshots arrive on the returned receiver;
    /// dropping it unsubscribes (the dead sink is pruned on the next
    /// broadcast).
    pub async fn subscribe(&self, id: &str) -> mpsc::Receiver<Request> {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        self.sinks
            .lock()
            .await
            .entry(id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Watch every request, e.g. for an index view. Lagging receivers
    /// lose oldest snapshots.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Request> {
        self.global_tx.subscribe()
    }

    /// Store the newer snapshot and fan it out. Delivery is best-effort:
    /// a full sink drops this snapshot, a closed sink is pruned, and
    /// neither stalls the caller.
    pub async fn broadcast_update(&self, request: &Request) {
        {
            let mut requests = self.requests.write().await;
            match requests.get(&request.id) {
                Some(stored) if stored.updated_at > request.updated_at => {
                    warn!(
                        "request {}: ignoring stale snapshot ({} < {})",
                        request.id, request.updated_at, stored.updated_at
                    );
                }
                _ => {
                    requests.insert(request.id.clone(), request.clone());
                }
            }
        }

        let mut sinks = self.sinks.lock().await;
        if let Some(subscribers) = sinks.get_mut(&request.id) {
            subscribers.retain(|tx| match tx.try_send(request.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("request {}: slow subscriber, snapshot dropped", request.id);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
            if subscribers.is_empty() {
                sinks.remove(&request.id);
            }
        }
        drop(sinks);

        // No receivers on the global channel is the normal case.
        let _ = self.global_tx.send(request.clone());
    }
}
