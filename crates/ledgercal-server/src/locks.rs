//! Per-key async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ledgercal_core::LogicalId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per logical id, created on demand.
///
/// Clones share the same table. Entries nobody holds are pruned on the next
/// lock call, so the table only grows with concurrent contention.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    table: Arc<Mutex<HashMap<LogicalId, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn lock(&self, key: &LogicalId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.retain(|_, lock| Arc::strong_count(lock) > 1);
            table.entry(key.clone()).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let key = LogicalId::new("acme-ltd-anniv-2025");

        let guard = locks.lock(&key).await;
        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(&LogicalId::new("event-1")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&LogicalId::new("event-2")))
            .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        for n in 0..10 {
            let _guard = locks.lock(&LogicalId::new(format!("event-{n}"))).await;
        }
        assert!(locks.len() <= 1);
    }
}
