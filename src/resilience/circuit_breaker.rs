//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: target assumed down, calls are skipped
//! - Half-Open: cooldown elapsed, trial calls allowed
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: cooldown elapsed since the last failure (on can_execute)
//! Half-Open → Closed: any recorded success
//! Half-Open → Open: any recorded failure (counter is still past threshold)
//! ```
//!
//! One breaker per downstream target, each behind its own lock.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Mutable breaker state for one target.
#[derive(Debug, Clone)]
pub struct CircuitBreakerRecord {
    pub consecutive_failures: u32,
    pub last_failure: Option<Instant>,
    pub state: CircuitState,
}

impl Default for CircuitBreakerRecord {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure: None,
            state: CircuitState::Closed,
        }
    }
}

/// Point-in-time view of a breaker, for operators.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub target: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Milliseconds until a trial call is allowed, when open.
    pub retry_in_ms: Option<u64>,
}

/// Circuit breaker for a single downstream target.
#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    failure_threshold: u32,
    cooldown: Duration,
    record: RwLock<CircuitBreakerRecord>,
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            target: target.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            record: RwLock::new(CircuitBreakerRecord::default()),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn cooled_down(&self, record: &CircuitBreakerRecord) -> bool {
        record
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.cooldown)
    }

    /// Whether a call may be attempted now.
    ///
    /// An open breaker whose cooldown has elapsed moves to half-open here.
    pub fn can_execute(&self) -> bool {
        {
            let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
            match record.state {
                CircuitState::Closed | CircuitState::HalfOpen => return true,
                CircuitState::Open if !self.cooled_down(&record) => return false,
                CircuitState::Open => {}
            }
        }

        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        if record.state == CircuitState::Open && self.cooled_down(&record) {
            record.state = CircuitState::HalfOpen;
            tracing::info!(target_name = %self.target, "Circuit half-open, allowing trial call");
            metrics::record_breaker_transition(&self.target, CircuitState::HalfOpen);
        }
        record.state != CircuitState::Open
    }

    /// Reset the failure count and close the circuit.
    pub fn record_success(&self) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        let previous = record.state;
        record.consecutive_failures = 0;
        record.state = CircuitState::Closed;
        if previous != CircuitState::Closed {
            tracing::info!(target_name = %self.target, from = previous.as_str(), "Circuit closed");
            metrics::record_breaker_transition(&self.target, CircuitState::Closed);
        }
    }

    /// Count a failure, opening the circuit once the threshold is reached.
    pub fn record_failure(&self) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);
        if record.consecutive_failures >= self.failure_threshold {
            if record.state != CircuitState::Open {
                tracing::warn!(
                    target_name = %self.target,
                    failures = record.consecutive_failures,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "Circuit opened"
                );
                metrics::record_breaker_transition(&self.target, CircuitState::Open);
            }
            record.state = CircuitState::Open;
            record.last_failure = Some(Instant::now());
        }
    }

    /// Current state without triggering the half-open transition.
    pub fn state(&self) -> CircuitState {
        self.record.read().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.record
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
        let retry_in_ms = match (record.state, record.last_failure) {
            (CircuitState::Open, Some(at)) => {
                Some(self.cooldown.saturating_sub(at.elapsed()).as_millis() as u64)
            }
            _ => None,
        };
        CircuitSnapshot {
            target: self.target.clone(),
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            retry_in_ms,
        }
    }
}

/// Independent breakers keyed by target name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Create closed breakers for every known target up front.
    pub fn with_targets<I, S>(config: CircuitBreakerConfig, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self::new(config);
        for target in targets {
            registry.get(target.as_ref());
        }
        registry
    }

    /// Breaker for `target`, created closed on first use.
    pub fn get(&self, target: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
        {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().unwrap_or_else(PoisonError::into_inner);
        let breaker = breakers.entry(target.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                target,
                self.config.failure_threshold,
                self.config.cooldown(),
            ))
        });
        Arc::clone(breaker)
    }

    /// Snapshots of every breaker, sorted by target.
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|b| b.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.target.cmp(&b.target));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new("p", 5, Duration::from_secs(30));
        for _ in 0..4 {
            breaker.record_failure();
            assert!(breaker.can_execute());
        }
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());
        assert!(breaker.snapshot().retry_in_ms.is_some());
    }

    #[test]
    fn test_success_resets_immediately() {
        let breaker = CircuitBreaker::new("p", 3, Duration::from_secs(30));
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert!(!breaker.can_execute());

        breaker.record_success();
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.can_execute());

        // The count restarts from zero.
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.can_execute());
    }

    #[test]
    fn test_half_open_after_cooldown() {
        let breaker = CircuitBreaker::new("p", 2, Duration::from_millis(30));
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.can_execute());

        std::thread::sleep(Duration::from_millis(50));
        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // A failed trial reopens straight away.
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.can_execute());

        std::thread::sleep(Duration::from_millis(50));
        assert!(breaker.can_execute());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_registry_targets_are_independent() {
        let registry = CircuitBreakerRegistry::with_targets(
            CircuitBreakerConfig {
                failure_threshold: 1,
                cooldown_ms: 60_000,
            },
            ["a", "b"],
        );
        registry.get("a").record_failure();

        assert!(!registry.get("a").can_execute());
        assert!(registry.get("b").can_execute());
        assert!(Arc::ptr_eq(&registry.get("a"), &registry.get("a")));

        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].target, "a");
        assert_eq!(snapshots[0].state, CircuitState::Open);
        assert_eq!(snapshots[1].state, CircuitState::Closed);
    }
}
