//! Rate-limited health answers per downstream target.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::HealthCacheConfig;
use crate::observability::metrics;

/// Performs one real health check against a target.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// `true` when the target reports itself healthy. Errors read as `false`.
    async fn probe(&self, target: &str) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct HealthRecord {
    healthy: bool,
    checked_at: Instant,
    checked_at_utc: DateTime<Utc>,
}

type Slot = Arc<Mutex<Option<HealthRecord>>>;

/// Cached health of one target, for operators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub target: String,
    pub healthy: bool,
    pub last_checked_at: DateTime<Utc>,
    pub age_ms: u64,
}

/// Per-target health answers, refreshed at most once per window.
pub struct HealthCache {
    probe: Arc<dyn HealthProbe>,
    enabled: bool,
    window: Duration,
    records: RwLock<HashMap<String, Slot>>,
}

impl HealthCache {
    pub fn new(probe: Arc<dyn HealthProbe>, config: &HealthCacheConfig) -> Self {
        Self {
            probe,
            enabled: config.enabled,
            window: config.window(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `target` is healthy.
    ///
    /// Serves the cached answer while it is younger than the window; otherwise
    /// probes once and caches the result. Always `true` when disabled.
    pub async fn is_healthy(&self, target: &str) -> bool {
        if !self.enabled {
            return true;
        }

        let slot = self.slot(target);
        let mut record = slot.lock().await;
        if let Some(cached) = record.as_ref() {
            if cached.checked_at.elapsed() < self.window {
                return cached.healthy;
            }
        }

        let healthy = self.probe.probe(target).await;
        metrics::record_health_probe(target, healthy);
        if record.as_ref().map(|r| r.healthy) != Some(healthy) {
            tracing::info!(target_name = %target, healthy, "Target health changed");
        }
        *record = Some(HealthRecord {
            healthy,
            checked_at: Instant::now(),
            checked_at_utc: Utc::now(),
        });
        healthy
    }

    /// Every cached record, sorted by target. Targets being probed right now
    /// report their previous answer once the probe finishes.
    pub async fn snapshots(&self) -> Vec<HealthSnapshot> {
        let slots: Vec<(String, Slot)> = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(target, slot)| (target.clone(), Arc::clone(slot)))
            .collect();

        let mut snapshots = Vec::with_capacity(slots.len());
        for (target, slot) in slots {
            if let Some(record) = *slot.lock().await {
                snapshots.push(HealthSnapshot {
                    target,
                    healthy: record.healthy,
                    last_checked_at: record.checked_at_utc,
                    age_ms: record.checked_at.elapsed().as_millis() as u64,
                });
            }
        }
        snapshots.sort_by(|a, b| a.target.cmp(&b.target));
        snapshots
    }

    fn slot(&self, target: &str) -> Slot {
        if let Some(slot) = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            return Arc::clone(slot);
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(records.entry(target.to_string()).or_default())
    }
}

impl std::fmt::Debug for HealthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCache")
            .field("enabled", &self.enabled)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingProbe {
        calls: AtomicUsize,
        healthy: AtomicBool,
        delay: Duration,
    }

    impl CountingProbe {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                healthy: AtomicBool::new(true),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HealthProbe for CountingProbe {
        async fn probe(&self, _target: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn config(window_ms: u64) -> HealthCacheConfig {
        HealthCacheConfig {
            window_ms,
            ..HealthCacheConfig::default()
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_within_window_probe_once() {
        let probe = CountingProbe::new(Duration::ZERO);
        let cache = HealthCache::new(probe.clone(), &config(5_000));

        assert!(cache.is_healthy("a").await);
        probe.healthy.store(false, Ordering::SeqCst);
        assert!(cache.is_healthy("a").await);
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_probe_once() {
        let probe = CountingProbe::new(Duration::from_millis(30));
        let cache = Arc::new(HealthCache::new(probe.clone(), &config(5_000)));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.is_healthy("a").await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_refreshes_after_window() {
        let probe = CountingProbe::new(Duration::ZERO);
        let cache = HealthCache::new(probe.clone(), &config(30));

        assert!(cache.is_healthy("a").await);
        probe.healthy.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!cache.is_healthy("a").await);
        assert_eq!(probe.calls(), 2);

        let snapshots = cache.snapshots().await;
        assert_eq!(snapshots.len(), 1);
        assert!(!snapshots[0].healthy);
    }

    #[tokio::test]
    async fn test_targets_are_cached_separately() {
        let probe = CountingProbe::new(Duration::ZERO);
        let cache = HealthCache::new(probe.clone(), &config(5_000));
        cache.is_healthy("a").await;
        cache.is_healthy("b").await;
        cache.is_healthy("a").await;
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test]
    async fn test_disabled_never_probes() {
        let probe = CountingProbe::new(Duration::ZERO);
        probe.healthy.store(false, Ordering::SeqCst);
        let cache = HealthCache::new(
            probe.clone(),
            &HealthCacheConfig {
                enabled: false,
                ..HealthCacheConfig::default()
            },
        );
        assert!(cache.is_healthy("a").await);
        assert_eq!(probe.calls(), 0);
    }
}
