//! The dispatcher: dedup check, fan-out race, commit.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::config::DispatchConfig;
use crate::dispatch::strategy::{CancelSignal, Strategy};
use crate::observability::metrics;
use crate::payments::{Claim, DeduplicationStore, PaymentRequest, StrategyResult};

/// Why a dispatch produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no strategies configured")]
    NoStrategies,

    #[error("every strategy abstained")]
    Exhausted,

    #[error("no strategy answered within {}ms", .0.as_millis())]
    DeadlineExceeded(Duration),
}

/// A committed result and whether it was served from the dedup store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub result: StrategyResult,
    pub replayed: bool,
}

/// Runs strategies concurrently and commits to the first result.
pub struct Dispatcher {
    strategies: Vec<Arc<dyn Strategy>>,
    dedup: Arc<DeduplicationStore>,
    deadline: Duration,
    loser_grace: Duration,
}

impl Dispatcher {
    pub fn new(
        strategies: Vec<Arc<dyn Strategy>>,
        dedup: Arc<DeduplicationStore>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            strategies,
            dedup,
            deadline: config.deadline(),
            loser_grace: config.loser_grace(),
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve `payment` to its one committed result.
    ///
    /// A key seen before replays its stored result. A key another request is
    /// racing right now waits for that race. Otherwise the strategies race
    /// and the winner is committed.
    pub async fn dispatch(&self, payment: &PaymentRequest) -> Result<Dispatch, DispatchError> {
        if self.strategies.is_empty() {
            return Err(DispatchError::NoStrategies);
        }
        let key = payment.correlation_id.as_str();

        loop {
            match self.dedup.claim(key) {
                Claim::Committed(result) => return Ok(replay(key, result)),
                Claim::InFlight(waiter) => {
                    tracing::debug!(correlation_id = %key, "Waiting on in-flight duplicate");
                    if let Some(result) = waiter.wait().await {
                        return Ok(replay(key, result));
                    }
                }
                Claim::Owner(ticket) => {
                    let winner = self.race(payment).await?;
                    let result = ticket.commit(winner);
                    return Ok(Dispatch {
                        result,
                        replayed: false,
                    });
                }
            }
        }
    }

    async fn race(&self, payment: &PaymentRequest) -> Result<StrategyResult, DispatchError> {
        let (tx, mut rx) = mpsc::channel(self.strategies.len());
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for strategy in &self.strategies {
            let strategy = Arc::clone(strategy);
            let payment = payment.clone();
            let tx = tx.clone();
            let cancel = CancelSignal::new(cancel_rx.clone());
            tasks.spawn(async move {
                if let Some(result) = strategy.attempt(&payment, cancel).await {
                    let _ = tx.send(result).await;
                }
            });
        }
        drop(tx);

        let outcome = tokio::time::timeout(self.deadline, rx.recv()).await;
        let _ = cancel_tx.send(true);
        self.reap(tasks);

        match outcome {
            Ok(Some(result)) => {
                tracing::debug!(
                    correlation_id = %payment.correlation_id,
                    strategy = %result.source,
                    "Strategy won the race"
                );
                metrics::record_strategy_win(&result.source);
                Ok(result)
            }
            Ok(None) => {
                tracing::warn!(correlation_id = %payment.correlation_id, "Every strategy abstained");
                metrics::record_exhausted();
                Err(DispatchError::Exhausted)
            }
            Err(_) => {
                tracing::warn!(
                    correlation_id = %payment.correlation_id,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Dispatch deadline exceeded"
                );
                metrics::record_exhausted();
                Err(DispatchError::DeadlineExceeded(self.deadline))
            }
        }
    }

    /// Let losers finish in the background, aborting whatever outlives the
    /// grace period.
    fn reap(&self, mut tasks: JoinSet<()>) {
        let grace = self.loser_grace;
        tokio::spawn(async move {
            let drained = tokio::time::timeout(grace, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                tracing::debug!(remaining = tasks.len(), "Aborting strategies past grace period");
                tasks.abort_all();
            }
        });
    }
}

fn replay(key: &str, result: StrategyResult) -> Dispatch {
    tracing::debug!(correlation_id = %key, "Replaying stored result");
    metrics::record_replay();
    Dispatch {
        result,
        replayed: true,
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("strategies", &self.strategy_names())
            .field("deadline", &self.deadline)
            .field("loser_grace", &self.loser_grace)
            .finish()
    }
}
