//! Per-device TTL cache of live sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use log::{debug, info, warn};

use super::{ConnectOptions, DeviceClient, DeviceFactory, SessionHandle};
use crate::clock::Clock;
use crate::error::{DeviceError, Error, Result};
use crate::topology::{DeviceSpec, TopologyCache};

/// Maps device names to live sessions, connecting on demand.
///
/// With a TTL of zero nothing is cached: every [`acquire`](Self::acquire)
/// opens a fresh session and every [`release`](Self::release) closes it.
/// Otherwise sessions idle for longer than the TTL are closed by the sweep
/// that runs at the start of each acquire.
///
/// Cache mutation for one device name runs under that name's gate, so two
/// concurrent acquires of a device connect once. Different devices never
/// wait on each other's connect.
pub struct SessionCache {
    topology: Arc<TopologyCache>,
    factory: Arc<dyn DeviceFactory>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    options: ConnectOptions,
    entries: Mutex<HashMap<String, Entry>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

struct Entry {
    handle: SessionHandle,
    last_used: Instant,
}

impl SessionCache {
    pub fn new(
        topology: Arc<TopologyCache>,
        factory: Arc<dyn DeviceFactory>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            topology,
            factory,
            ttl,
            clock,
            options: ConnectOptions::default(),
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the options used for new connections.
    pub fn with_connect_options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a connected session for `name`.
    ///
    /// Fails with [`Error::DeviceNotFound`] when the device is not in the
    /// current testbed; no connection is attempted in that case.
    pub async fn acquire(&self, name: &str) -> Result<SessionHandle> {
        let snapshot = self.topology.get().await?;
        let spec = snapshot
            .device(name)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                name: name.to_string(),
                testbed: self.topology.source(),
            })?;

        if self.ttl.is_zero() {
            return self.connect(name, spec).await;
        }

        self.sweep().await;

        let gate = self.gate(name);
        let _guard = gate.lock().await;

        let cached = self.entries().get(name).map(|entry| entry.handle.clone());
        if let Some(handle) = cached {
            if handle.lock().await.is_connected() {
                debug!("Reusing cached session for {}", name);
                self.touch(&handle);
                return Ok(handle);
            }
            debug!("Cached session for {} is no longer connected", name);
            self.remove_entry(&handle);
        }

        let handle = self.connect(name, spec).await?;
        self.entries().insert(
            name.to_string(),
            Entry {
                handle: handle.clone(),
                last_used: self.clock.now(),
            },
        );
        Ok(handle)
    }

    /// Return a session after use.
    ///
    /// With caching on and `force` unset this only marks the session as
    /// used. Otherwise the session leaves the cache and is disconnected.
    /// Releasing the same handle twice is harmless.
    pub async fn release(&self, handle: &SessionHandle, force: bool) {
        if !self.ttl.is_zero() && !force {
            self.touch(handle);
            return;
        }

        {
            let gate = self.gate(handle.name());
            let _guard = gate.lock().await;
            self.remove_entry(handle);
        }
        close(handle).await;
    }

    /// Disconnect and drop every cached session.
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = self
            .entries()
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect();
        if !handles.is_empty() {
            info!("Closing {} cached sessions", handles.len());
        }
        join_all(handles.iter().map(close)).await;
    }

    /// Names of the devices with a cached session, sorted.
    pub fn cached_devices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries().keys().cloned().collect();
        names.sort();
        names
    }

    async fn connect(&self, name: &str, spec: Arc<DeviceSpec>) -> Result<SessionHandle> {
        let mut client = self.factory.create(name, &spec)?;

        info!("Connecting to {}", spec);
        tokio::time::timeout(self.options.timeout, client.connect(&self.options))
            .await
            .map_err(|_| DeviceError::Timeout(self.options.timeout))??;
        info!("Connected to {}", name);

        Ok(SessionHandle::new(name, spec, client))
    }

    /// Close sessions idle for longer than the TTL.
    ///
    /// A device whose gate or session lock is held is skipped and stays
    /// cached until a later sweep finds it idle.
    async fn sweep(&self) {
        let now = self.clock.now();
        let candidates: Vec<String> = self
            .entries()
            .iter()
            .filter(|(_, entry)| self.expired(entry, now))
            .map(|(name, _)| name.clone())
            .collect();

        for name in candidates {
            let gate = self.gate(&name);
            let Ok(_guard) = gate.try_lock() else {
                debug!("Skipping eviction of {}: acquire in progress", name);
                continue;
            };

            // Re-check under the gate: an acquire may have just used it.
            let handle = match self.entries().get(&name) {
                Some(entry) if self.expired(entry, self.clock.now()) => entry.handle.clone(),
                _ => continue,
            };
            let Some(mut client) = handle.try_lock() else {
                debug!("Skipping eviction of {}: operation in flight", name);
                continue;
            };

            self.remove_entry(&handle);
            info!("Evicting idle session for {}", name);
            disconnect(&name, &mut client).await;
        }
    }

    fn expired(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_used) > self.ttl
    }

    fn touch(&self, handle: &SessionHandle) {
        let now = self.clock.now();
        if let Some(entry) = self.entries().get_mut(handle.name()) {
            if entry.handle.same_session(handle) {
                entry.last_used = now;
            }
        }
    }

    fn remove_entry(&self, handle: &SessionHandle) {
        let mut entries = self.entries();
        if entries
            .get(handle.name())
            .is_some_and(|entry| entry.handle.same_session(handle))
        {
            entries.remove(handle.name());
        }
    }

    fn gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Disconnect if still connected; failures are logged and dropped.
async fn close(handle: &SessionHandle) {
    let mut client = handle.lock().await;
    disconnect(handle.name(), &mut client).await;
}

async fn disconnect(name: &str, client: &mut Box<dyn DeviceClient>) {
    if !client.is_connected() {
        return;
    }
    match client.disconnect().await {
        Ok(()) => info!("Disconnected from {}", name),
        Err(e) => warn!("Error disconnecting from {}: {}", name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{CountingLoader, FakeFactory};

    struct Fixture {
        cache: Arc<SessionCache>,
        factory: Arc<FakeFactory>,
        loader: Arc<CountingLoader>,
        clock: Arc<ManualClock>,
    }

    fn fixture(ttl: u64) -> Fixture {
        let loader = Arc::new(CountingLoader::new(&["R1", "R2"]));
        let clock = Arc::new(ManualClock::new());
        let topology = Arc::new(TopologyCache::new(
            loader.clone(),
            Duration::from_secs(300),
            clock.clone(),
        ));
        let factory = Arc::new(FakeFactory::new());
        let cache = Arc::new(SessionCache::new(
            topology,
            factory.clone(),
            Duration::from_secs(ttl),
            clock.clone(),
        ));
        Fixture {
            cache,
            factory,
            loader,
            clock,
        }
    }

    #[tokio::test]
    async fn test_unknown_device_never_connects() {
        let f = fixture(60);
        let err = f.cache.acquire("R9").await.unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { ref name, .. } if name == "R9"));
        assert_eq!(err.to_string(), "Device 'R9' not found in testbed 'fake-testbed'");
        assert_eq!(f.factory.connects(), 0);
        assert_eq!(f.factory.created(), 0);
    }

    #[tokio::test]
    async fn test_ttl_zero_connects_every_time() {
        let f = fixture(0);
        for _ in 0..3 {
            let handle = f.cache.acquire("R1").await.unwrap();
            f.cache.release(&handle, false).await;
        }
        assert_eq!(f.factory.connects(), 3);
        assert_eq!(f.factory.disconnects(), 3);
        assert!(f.cache.cached_devices().is_empty());
    }

    #[tokio::test]
    async fn test_reuse_within_ttl() {
        let f = fixture(60);
        let first = f.cache.acquire("R1").await.unwrap();
        f.cache.release(&first, false).await;

        f.clock.advance(Duration::from_secs(59));
        let second = f.cache.acquire("R1").await.unwrap();

        assert!(first.same_session(&second));
        assert_eq!(f.factory.connects(), 1);
        assert_eq!(f.factory.disconnects(), 0);
        assert_eq!(f.cache.cached_devices(), vec!["R1"]);
    }

    #[tokio::test]
    async fn test_idle_session_evicted_by_sweep() {
        let f = fixture(60);
        let r1 = f.cache.acquire("R1").await.unwrap();
        f.cache.release(&r1, false).await;

        f.clock.advance(Duration::from_secs(61));
        let r2 = f.cache.acquire("R2").await.unwrap();
        f.cache.release(&r2, false).await;

        assert_eq!(f.factory.disconnects(), 1);
        assert_eq!(f.cache.cached_devices(), vec!["R2"]);

        let again = f.cache.acquire("R1").await.unwrap();
        assert!(!again.same_session(&r1));
        assert_eq!(f.factory.connects(), 3);
    }

    #[tokio::test]
    async fn test_eviction_swallows_disconnect_errors() {
        let f = fixture(10);
        let r1 = f.cache.acquire("R1").await.unwrap();
        f.cache.release(&r1, false).await;

        f.factory.fail_disconnect(true);
        f.clock.advance(Duration::from_secs(11));
        assert!(f.cache.acquire("R2").await.is_ok());
        assert_eq!(f.cache.cached_devices(), vec!["R2"]);
    }

    #[tokio::test]
    async fn test_sweep_skips_busy_session() {
        let f = fixture(10);
        f.factory.set_execute_delay(Duration::from_millis(1500));

        let r1 = f.cache.acquire("R1").await.unwrap();
        let busy = r1.clone();
        let task = tokio::spawn(async move {
            busy.lock()
                .await
                .execute("show tech-support", Duration::from_secs(5))
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        f.clock.advance(Duration::from_secs(11));
        let start = std::time::Instant::now();
        let r2 = f.cache.acquire("R2").await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        f.cache.release(&r2, false).await;

        assert_eq!(f.factory.disconnects(), 0);
        assert_eq!(f.cache.cached_devices(), vec!["R1", "R2"]);

        assert!(task.await.unwrap().is_ok());
        f.cache.release(&r1, false).await;

        // Once idle again it expires like any other session
        f.clock.advance(Duration::from_secs(11));
        f.cache.acquire("R2").await.unwrap();
        assert_eq!(f.cache.cached_devices(), vec!["R2"]);
    }

    #[tokio::test]
    async fn test_dead_session_is_replaced() {
        let f = fixture(60);
        let first = f.cache.acquire("R1").await.unwrap();
        f.factory.drop_on_execute(true);
        let result = first
            .lock()
            .await
            .execute("show version", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(DeviceError::Disconnected)));

        let second = f.cache.acquire("R1").await.unwrap();
        assert!(!first.same_session(&second));
        assert_eq!(f.factory.connects(), 2);
    }

    #[tokio::test]
    async fn test_forced_release_removes_and_disconnects() {
        let f = fixture(60);
        let handle = f.cache.acquire("R1").await.unwrap();
        f.cache.release(&handle, true).await;
        assert!(f.cache.cached_devices().is_empty());
        assert_eq!(f.factory.disconnects(), 1);

        // Idempotent
        f.cache.release(&handle, true).await;
        assert_eq!(f.factory.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_connects_once() {
        let f = fixture(60);
        f.factory.set_connect_delay(Duration::from_millis(50));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let cache = f.cache.clone();
                tokio::spawn(async move { cache.acquire("R1").await })
            })
            .collect();
        let handles: Vec<SessionHandle> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(f.factory.connects(), 1);
        assert!(handles.iter().all(|h| h.same_session(&handles[0])));
    }

    #[tokio::test]
    async fn test_devices_connect_independently() {
        let f = fixture(60);
        f.factory.set_connect_delay(Duration::from_millis(200));

        let start = std::time::Instant::now();
        let (a, b) = tokio::join!(f.cache.acquire("R1"), f.cache.acquire("R2"));
        a.unwrap();
        b.unwrap();
        assert!(start.elapsed() < Duration::from_millis(390));
        assert_eq!(f.factory.connects(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_cached() {
        let f = fixture(60);
        f.factory.fail_connect(true);
        let err = f.cache.acquire("R1").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Connection);
        assert!(f.cache.cached_devices().is_empty());

        f.factory.fail_connect(false);
        assert!(f.cache.acquire("R1").await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_everything() {
        let f = fixture(60);
        f.cache.acquire("R1").await.unwrap();
        f.cache.acquire("R2").await.unwrap();
        f.cache.shutdown().await;
        assert_eq!(f.factory.disconnects(), 2);
        assert!(f.cache.cached_devices().is_empty());
        assert_eq!(f.loader.loads(), 1);
    }
}
