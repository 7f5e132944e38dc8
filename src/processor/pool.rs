//! Per-target connection pools.
//!
//! # Responsibilities
//! - Keep a fixed set of `size` handles per downstream target
//! - Hand them out in strict rotation so load spreads evenly
//! - Build a target's pool lazily, exactly once, on first use
//!
//! Handles are shared rather than exclusively leased: a handle may serve
//! several calls at once, which is how reqwest clients are meant to be used.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

use crate::config::PoolConfig;

/// Failure to build a pool for a target.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to build connection {slot} for '{target}': {reason}")]
    Build {
        target: String,
        slot: usize,
        reason: String,
    },
}

/// Builds the handles a pool hands out.
pub trait HandleFactory: Send + Sync {
    type Handle: Clone + Send + Sync;

    fn create(&self, target: &str, slot: usize) -> Result<Self::Handle, PoolError>;
}

#[derive(Debug)]
struct PoolEntry<H> {
    handles: Vec<H>,
    cursor: usize,
}

/// Round-robin pools keyed by target name.
pub struct ConnectionPool<F: HandleFactory> {
    factory: F,
    size: usize,
    pools: RwLock<HashMap<String, Arc<Mutex<PoolEntry<F::Handle>>>>>,
}

impl<F: HandleFactory> ConnectionPool<F> {
    pub fn new(factory: F, size: usize) -> Self {
        Self {
            factory,
            size: size.max(1),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Next handle for `target`, in rotation.
    ///
    /// The first call for a target builds all of its handles. Concurrent first
    /// calls build only once.
    pub fn get_connection(&self, target: &str) -> Result<F::Handle, PoolError> {
        let entry = self.entry(target)?;
        let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = entry.handles[entry.cursor].clone();
        entry.cursor = (entry.cursor + 1) % entry.handles.len();
        Ok(handle)
    }

    /// Number of targets with a built pool.
    pub fn targets(&self) -> usize {
        self.pools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn entry(&self, target: &str) -> Result<Arc<Mutex<PoolEntry<F::Handle>>>, PoolError> {
        if let Some(entry) = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            return Ok(Arc::clone(entry));
        }

        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = pools.get(target) {
            return Ok(Arc::clone(entry));
        }

        let handles = (0..self.size)
            .map(|slot| self.factory.create(target, slot))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(target_name = %target, size = self.size, "Connection pool created");

        let entry = Arc::new(Mutex::new(PoolEntry { handles, cursor: 0 }));
        pools.insert(target.to_string(), Arc::clone(&entry));
        Ok(entry)
    }
}

impl<F: HandleFactory> std::fmt::Debug for ConnectionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size)
            .field("targets", &self.targets())
            .finish()
    }
}

/// Builds one reqwest client per pool slot.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    config: PoolConfig,
}

impl HttpClientFactory {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }
}

impl HandleFactory for HttpClientFactory {
    type Handle = reqwest::Client;

    fn create(&self, target: &str, slot: usize) -> Result<reqwest::Client, PoolError> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(self.config.connect_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(self.config.idle_timeout_secs))
            .pool_max_idle_per_host(self.config.max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(self.config.tcp_keepalive_secs))
            .build()
            .map_err(|e| PoolError::Build {
                target: target.to_string(),
                slot,
                reason: e.to_string(),
            })
    }
}

pub type HttpPool = ConnectionPool<HttpClientFactory>;
