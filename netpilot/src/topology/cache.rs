//! TTL cache for the testbed snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use tokio::sync::Mutex;

use super::{TopologyLoader, TopologySnapshot};
use crate::clock::Clock;
use crate::error::TopologyError;

/// Single-slot cache in front of a [`TopologyLoader`].
///
/// The slot lock is held across a reload, so concurrent callers either get
/// the previous snapshot or wait for the complete new one. A TTL of zero
/// reloads on every call.
pub struct TopologyCache {
    loader: Arc<dyn TopologyLoader>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Loaded>>,
}

struct Loaded {
    snapshot: Arc<TopologySnapshot>,
    loaded_at: Instant,
}

impl TopologyCache {
    pub fn new(loader: Arc<dyn TopologyLoader>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            loader,
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Return the current snapshot, reloading it first if it is missing or
    /// older than the TTL.
    ///
    /// A failed reload leaves the previous snapshot in place but still
    /// reports the error: a stale snapshot is never handed out.
    pub async fn get(&self) -> Result<Arc<TopologySnapshot>, TopologyError> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();

        if let Some(loaded) = slot.as_ref() {
            if self.is_fresh(loaded, now) {
                return Ok(loaded.snapshot.clone());
            }
            debug!("Testbed snapshot expired, reloading from {}", self.loader.source());
        }

        let snapshot = Arc::new(self.loader.load().await?);
        info!(
            "Loaded testbed '{}' with {} devices",
            snapshot.name,
            snapshot.devices.len()
        );
        *slot = Some(Loaded {
            snapshot: snapshot.clone(),
            loaded_at: now,
        });
        Ok(snapshot)
    }

    /// Drop the cached snapshot so the next call reloads.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    /// Where the descriptor comes from.
    pub fn source(&self) -> String {
        self.loader.source()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, loaded: &Loaded, now: Instant) -> bool {
        !self.ttl.is_zero() && now.saturating_duration_since(loaded.loaded_at) <= self.ttl
    }
}
