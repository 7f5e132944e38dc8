//! Idempotency store: correlation id → committed result.
//!
//! Entries are never evicted. A committed result is immutable: the first
//! writer wins and every later request with the same key receives it
//! verbatim.
//!
//! Besides plain `lookup`/`record`, [`DeduplicationStore::claim`] installs an
//! in-flight marker for a key so that concurrent first-time requests do not
//! each run their own race: the owner runs it, the others wait for the
//! owner's committed result.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::payments::types::StrategyResult;

/// A committed result and when it was stored.
#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub result: StrategyResult,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
enum Slot {
    InFlight(watch::Receiver<Option<StrategyResult>>),
    Committed(DedupEntry),
}

/// Outcome of [`DeduplicationStore::claim`].
#[derive(Debug)]
pub enum Claim<'a> {
    /// A result is already committed for this key.
    Committed(StrategyResult),
    /// Another request owns this key right now.
    InFlight(InFlight),
    /// The caller owns this key and must commit or drop the ticket.
    Owner(ClaimTicket<'a>),
}

/// Handle for waiting on another request's result.
#[derive(Debug)]
pub struct InFlight {
    rx: watch::Receiver<Option<StrategyResult>>,
}

impl InFlight {
    /// Wait for the owner to commit. `None` means the owner gave up and the
    /// caller should claim again.
    pub async fn wait(mut self) -> Option<StrategyResult> {
        loop {
            if let Some(result) = self.rx.borrow_and_update().clone() {
                return Some(result);
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

/// Ownership of an in-flight key. Dropping it without committing releases
/// the key and wakes every waiter.
#[derive(Debug)]
pub struct ClaimTicket<'a> {
    store: &'a DeduplicationStore,
    key: String,
    tx: watch::Sender<Option<StrategyResult>>,
    committed: bool,
}

impl ClaimTicket<'_> {
    /// Commit `result` and return the value actually stored for the key.
    pub fn commit(mut self, result: StrategyResult) -> StrategyResult {
        let stored = self.store.record(&self.key, result);
        self.tx.send_replace(Some(stored.clone()));
        self.committed = true;
        stored
    }
}

impl Drop for ClaimTicket<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.store
                .entries
                .remove_if(&self.key, |_, slot| matches!(slot, Slot::InFlight(_)));
            tracing::debug!(correlation_id = %self.key, "Released in-flight claim without a result");
        }
    }
}

/// In-memory deduplication store.
#[derive(Debug, Default)]
pub struct DeduplicationStore {
    entries: DashMap<String, Slot>,
}

impl DeduplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed result for `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<StrategyResult> {
        match self.entries.get(key)?.value() {
            Slot::Committed(entry) => Some(entry.result.clone()),
            Slot::InFlight(_) => None,
        }
    }

    /// The committed entry for `key`, including its timestamp.
    pub fn entry(&self, key: &str) -> Option<DedupEntry> {
        match self.entries.get(key)?.value() {
            Slot::Committed(entry) => Some(entry.clone()),
            Slot::InFlight(_) => None,
        }
    }

    /// Store `result` for `key` unless a result is already committed.
    /// Returns whichever result is stored afterwards.
    pub fn record(&self, key: &str, result: StrategyResult) -> StrategyResult {
        let committed = |result: StrategyResult| {
            Slot::Committed(DedupEntry {
                result,
                recorded_at: Utc::now(),
            })
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if let Slot::Committed(existing) = occupied.get() {
                    return existing.result.clone();
                }
                occupied.insert(committed(result.clone()));
                result
            }
            Entry::Vacant(vacant) => {
                vacant.insert(committed(result.clone()));
                result
            }
        }
    }

    /// Look up `key`, taking ownership of it when nobody else has.
    pub fn claim(&self, key: &str) -> Claim<'_> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => match occupied.get() {
                Slot::Committed(entry) => Claim::Committed(entry.result.clone()),
                Slot::InFlight(rx) => Claim::InFlight(InFlight { rx: rx.clone() }),
            },
            Entry::Vacant(vacant) => {
                let (tx, rx) = watch::channel(None);
                vacant.insert(Slot::InFlight(rx));
                Claim::Owner(ClaimTicket {
                    store: self,
                    key: key.to_string(),
                    tx,
                    committed: false,
                })
            }
        }
    }

    /// Number of committed entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.value(), Slot::Committed(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys currently owned by an in-flight request.
    pub fn in_flight(&self) -> usize {
        self.entries.len().saturating_sub(self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::PaymentRequest;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn result(id: &str, tag: &str) -> StrategyResult {
        let payment = PaymentRequest::new(id, dec!(10)).unwrap();
        StrategyResult::fallback(&payment, tag)
    }

    #[test]
    fn test_first_writer_wins() {
        let store = DeduplicationStore::new();
        assert!(store.lookup("k").is_none());

        let first = store.record("k", result("k", "first"));
        let second = store.record("k", result("k", "second"));

        assert_eq!(first.message, "first");
        assert_eq!(second.message, "first");
        assert_eq!(store.lookup("k").unwrap().message, "first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_claim_then_commit() {
        let store = DeduplicationStore::new();
        let ticket = match store.claim("k") {
            Claim::Owner(ticket) => ticket,
            other => panic!("expected ownership, got {other:?}"),
        };
        assert!(matches!(store.claim("k"), Claim::InFlight(_)));
        assert!(store.lookup("k").is_none());
        assert_eq!(store.in_flight(), 1);

        ticket.commit(result("k", "winner"));
        assert!(matches!(store.claim("k"), Claim::Committed(r) if r.message == "winner"));
        assert_eq!(store.in_flight(), 0);
        assert!(store.entry("k").is_some());
    }

    #[test]
    fn test_dropped_ticket_releases_key() {
        let store = DeduplicationStore::new();
        let ticket = store.claim("k");
        drop(ticket);
        assert!(matches!(store.claim("k"), Claim::Owner(_)));
    }

    #[tokio::test]
    async fn test_waiter_receives_owner_result() {
        let store = DeduplicationStore::new();
        let Claim::Owner(ticket) = store.claim("k") else {
            panic!("expected ownership");
        };
        let Claim::InFlight(waiter) = store.claim("k") else {
            panic!("expected in-flight");
        };

        let (stored, waited) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ticket.commit(result("k", "owner"))
            },
            waiter.wait()
        );
        assert_eq!(waited, Some(stored));
    }

    #[tokio::test]
    async fn test_waiter_sees_abandonment() {
        let store = DeduplicationStore::new();
        let Claim::Owner(ticket) = store.claim("k") else {
            panic!("expected ownership");
        };
        let Claim::InFlight(waiter) = store.claim("k") else {
            panic!("expected in-flight");
        };
        drop(ticket);
        assert_eq!(waiter.wait().await, None);
    }

    #[test]
    fn test_commit_respects_direct_record() {
        let store = DeduplicationStore::new();
        let Claim::Owner(ticket) = store.claim("k") else {
            panic!("expected ownership");
        };
        store.record("k", result("k", "direct"));
        let stored = ticket.commit(result("k", "late"));
        assert_eq!(stored.message, "direct");
    }
}
