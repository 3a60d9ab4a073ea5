//! Per-(coating, diameter) sequence numbers that disambiguate product codes.
//!
//! Commits for one key are serialized in-process; the backing
//! [`SequenceService`] is expected to increment atomically as well, so two
//! processes sharing a store cannot hand out the same value either.

use std::{
  collections::HashMap,
  fmt,
  sync::{Arc, Mutex},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  spec::{CoatingType, diameter_code},
  store::SequenceService,
};

// ─── Key & ticket ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceKey {
  pub coating_type:  CoatingType,
  /// Four-digit diameter token, e.g. `"0250"`.
  pub diameter_code: String,
}

impl SequenceKey {
  pub fn new(coating_type: CoatingType, diameter: Decimal) -> Self {
    Self { coating_type, diameter_code: diameter_code(diameter) }
  }
}

impl fmt::Display for SequenceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.coating_type, self.diameter_code)
  }
}

/// A sequence value and whether the backing counter actually produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceTicket {
  pub value:     u32,
  /// `false` when the counter was unreachable and `value` is a placeholder.
  pub confirmed: bool,
}

impl SequenceTicket {
  const UNCONFIRMED: Self = Self { value: 0, confirmed: false };
}

// ─── Sequencer ───────────────────────────────────────────────────────────────

pub struct CodeSequencer<S> {
  service: Arc<S>,
  locks:   Mutex<HashMap<SequenceKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S: SequenceService> CodeSequencer<S> {
  pub fn new(service: Arc<S>) -> Self {
    Self { service, locks: Mutex::new(HashMap::new()) }
  }

  /// Advisory look at the next value. Never mutates the counter.
  pub async fn peek_next(&self, coating: CoatingType, diameter: Decimal) -> SequenceTicket {
    let key = SequenceKey::new(coating, diameter);
    match self.service.peek_next(&key).await {
      Ok(value) => SequenceTicket { value, confirmed: true },
      Err(e) => {
        warn!(%key, error = %e, "sequence peek failed; returning unconfirmed 0");
        SequenceTicket::UNCONFIRMED
      }
    }
  }

  /// Consume the next value for the key.
  pub async fn commit(&self, coating: CoatingType, diameter: Decimal) -> SequenceTicket {
    let key = SequenceKey::new(coating, diameter);
    let lock = self.key_lock(&key);
    let _guard = lock.lock().await;
    match self.service.commit(&key).await {
      Ok(value) => SequenceTicket { value, confirmed: true },
      Err(e) => {
        warn!(%key, error = %e, "sequence commit failed; returning unconfirmed 0");
        SequenceTicket::UNCONFIRMED
      }
    }
  }

  fn key_lock(&self, key: &SequenceKey) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
    locks.entry(key.clone()).or_default().clone()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicBool, Ordering};

  use rust_decimal_macros::dec;

  use super::*;

  /// In-memory counter; `offline` makes every call fail.
  #[derive(Default)]
  struct MemoryCounter {
    values:  Mutex<HashMap<SequenceKey, u32>>,
    offline: AtomicBool,
  }

  #[derive(Debug, thiserror::Error)]
  #[error("counter offline")]
  struct Offline;

  impl SequenceService for MemoryCounter {
    type Error = Offline;

    async fn peek_next(&self, key: &SequenceKey) -> Result<u32, Offline> {
      if self.offline.load(Ordering::SeqCst) {
        return Err(Offline);
      }
      Ok(self.values.lock().unwrap().get(key).copied().unwrap_or(0))
    }

    async fn commit(&self, key: &SequenceKey) -> Result<u32, Offline> {
      if self.offline.load(Ordering::SeqCst) {
        return Err(Offline);
      }
      // Yield between read and write so unserialized callers would race.
      let current = self.values.lock().unwrap().get(key).copied().unwrap_or(0);
      tokio::task::yield_now().await;
      self.values.lock().unwrap().insert(key.clone(), current + 1);
      Ok(current)
    }
  }

  #[tokio::test]
  async fn peek_does_not_consume() {
    let seq = CodeSequencer::new(Arc::new(MemoryCounter::default()));
    assert_eq!(seq.peek_next(CoatingType::Nit, dec!(2.50)).await.value, 0);
    assert_eq!(seq.peek_next(CoatingType::Nit, dec!(2.50)).await.value, 0);
    assert_eq!(seq.commit(CoatingType::Nit, dec!(2.50)).await.value, 0);
    assert_eq!(seq.peek_next(CoatingType::Nit, dec!(2.50)).await.value, 1);
  }

  #[tokio::test]
  async fn keys_are_independent() {
    let seq = CodeSequencer::new(Arc::new(MemoryCounter::default()));
    seq.commit(CoatingType::Nit, dec!(2.50)).await;
    assert_eq!(seq.commit(CoatingType::Pad, dec!(2.50)).await.value, 0);
    assert_eq!(seq.commit(CoatingType::Nit, dec!(3.00)).await.value, 0);
    assert_eq!(seq.commit(CoatingType::Nit, dec!(2.50)).await.value, 1);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn concurrent_commits_never_share_a_value() {
    let seq = Arc::new(CodeSequencer::new(Arc::new(MemoryCounter::default())));
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let seq = seq.clone();
        tokio::spawn(async move { seq.commit(CoatingType::Nit, dec!(3.00)).await.value })
      })
      .collect();
    let mut values = Vec::new();
    for h in handles {
      values.push(h.await.unwrap());
    }
    values.sort_unstable();
    assert_eq!(values, (0..8).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn unreachable_counter_yields_unconfirmed_zero() {
    let counter = Arc::new(MemoryCounter::default());
    counter.offline.store(true, Ordering::SeqCst);
    let seq = CodeSequencer::new(counter);
    let ticket = seq.commit(CoatingType::Nit, dec!(2.50)).await;
    assert_eq!(ticket, SequenceTicket { value: 0, confirmed: false });
  }
}
