use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use insertbench::backend::{BackendKind, InsertBackend, MemoryBackend};
use insertbench::config::Config;
use insertbench::dispatch::{DispatchError, FailurePolicy};
use insertbench::error::{BenchError, Result};
use insertbench::report::ReportFormat;
use insertbench::runner::{BenchRun, run_benchmark};
use insertbench::workload::{COL4_VALUE, UserRecord};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Keeps every record it receives
#[derive(Default)]
struct RecordingBackend {
    records: Mutex<Vec<UserRecord>>,
}

#[async_trait]
impl InsertBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Rejects every tenth call
#[derive(Default)]
struct FlakyBackend {
    calls: AtomicU64,
}

#[async_trait]
impl InsertBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 10 == 0 {
            return Err(BenchError::DuplicateKey(record.col0));
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_backend_receives_every_insert() {
    let backend = Arc::new(MemoryBackend::new());
    let report = run_benchmark(backend.clone(), &BenchRun::new(500, 32)).await.unwrap();

    assert_eq!(report.backend, "memory");
    assert_eq!(report.total, 500);
    assert_eq!(report.concurrency, 32);
    assert_eq!(backend.len(), 500);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_records_carry_fixed_columns_and_insert_time() {
    let before = Utc::now();
    let backend = Arc::new(RecordingBackend::default());
    run_benchmark(backend.clone(), &BenchRun::new(50, 50)).await.unwrap();
    let after = Utc::now();

    let records = backend.records.lock();
    assert_eq!(records.len(), 50);
    for record in records.iter() {
        assert_eq!(record.col1, "123456");
        assert_eq!(record.col3, 1);
        assert_eq!(record.col4, COL4_VALUE);
        assert!(record.col2 >= before && record.col2 <= after);
    }
    let mut keys: Vec<_> = records.iter().map(|r| r.col0).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backend_failures_fail_the_batch() {
    let backend = Arc::new(FlakyBackend::default());
    let err = run_benchmark(backend.clone(), &BenchRun::new(100, 8)).await.unwrap_err();

    let BenchError::Dispatch(DispatchError::Aggregate(aggregate)) = err else {
        panic!("expected an aggregate dispatch failure");
    };
    assert_eq!(aggregate.len(), 10);
    assert!(aggregate.first().source.downcast_ref::<BenchError>().is_some());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fail_fast_run_stops_early() {
    let backend = Arc::new(FlakyBackend::default());
    let mut run = BenchRun::new(1000, 1);
    run.policy = FailurePolicy::FailFast;

    let err = run_benchmark(backend.clone(), &run).await.unwrap_err();
    assert!(matches!(err, BenchError::Dispatch(DispatchError::Aggregate(_))));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_cancelled_run() {
    let token = CancellationToken::new();
    token.cancel();
    let run = BenchRun::new(100, 4).with_cancellation(token);

    let err = run_benchmark(Arc::new(MemoryBackend::new()), &run).await.unwrap_err();
    assert!(matches!(err, BenchError::Dispatch(DispatchError::Cancelled { started: 0, .. })));
}

#[tokio::test]
async fn test_invalid_concurrency() {
    let err = run_benchmark(Arc::new(MemoryBackend::new()), &BenchRun::new(10, 0)).await.unwrap_err();
    assert!(matches!(err, BenchError::Dispatch(DispatchError::InvalidArgument(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_configured_memory_run() {
    let config = Config::try_parse_from([
        "insertbench",
        "--backend", "memory",
        "--counts", "200",
        "--concurrency", "16",
        "--memory-latency-ms", "1",
        "--format", "json",
    ])
    .unwrap();
    config.validate().unwrap();

    let total = config.counts[0];
    let backend = BackendKind::Memory.connect(&config, total).await.unwrap();
    let report = run_benchmark(backend, &BenchRun::from_config(&config, total)).await.unwrap();

    assert_eq!(report.total, 200);
    assert_eq!(report.concurrency, 16);
    // 200 inserts of 1ms each, 16 at a time
    assert!(report.elapsed.as_millis() >= 12);

    let line: serde_json::Value = serde_json::from_str(&report.render(ReportFormat::Json)).unwrap();
    assert_eq!(line["backend"], "memory");
    assert_eq!(line["total"], 200);
}

#[tokio::test]
async fn test_empty_batch_report() {
    let report = run_benchmark(Arc::new(MemoryBackend::new()), &BenchRun::new(0, 1)).await.unwrap();
    assert_eq!(report.total, 0);
    assert_eq!(report.inserts_per_sec(), 0);
}
