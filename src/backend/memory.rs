use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use super::InsertBackend;
use crate::error::{BenchError, Result};
use crate::workload::UserRecord;

/// In-process table keyed by `col0`. Rejects a key it has already stored,
/// like a primary key would.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keys: Mutex<HashSet<Uuid>>,
    latency: Duration,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` before every insert to stand in for a round trip.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            keys: Mutex::new(HashSet::new()),
            latency,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    pub fn contains(&self, key: &Uuid) -> bool {
        self.keys.lock().contains(key)
    }
}

#[async_trait]
impl InsertBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if !self.keys.lock().insert(record.col0) {
            return Err(BenchError::DuplicateKey(record.col0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_duplicate() {
        let backend = MemoryBackend::new();
        let record = UserRecord::new(Uuid::new_v4());

        backend.insert(&record).await.unwrap();
        assert_eq!(backend.len(), 1);
        assert!(backend.contains(&record.col0));

        let err = backend.insert(&record).await.unwrap_err();
        assert!(matches!(err, BenchError::DuplicateKey(k) if k == record.col0));
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_applied() {
        let backend = MemoryBackend::with_latency(Duration::from_millis(50));
        let start = tokio::time::Instant::now();
        backend.insert(&UserRecord::new(Uuid::new_v4())).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
