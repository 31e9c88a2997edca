use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::backend::InsertBackend;
use crate::config::Config;
use crate::dispatch::{Dispatcher, FailurePolicy};
use crate::error::{BenchError, Result};
use crate::report::BenchReport;
use crate::workload::Workload;

/// Parameters for one timed batch.
#[derive(Debug, Clone)]
pub struct BenchRun {
    pub total: u64,
    pub concurrency: usize,
    pub policy: FailurePolicy,
    pub cancel: Option<CancellationToken>,
}

impl BenchRun {
    pub fn new(total: u64, concurrency: usize) -> Self {
        Self {
            total,
            concurrency,
            policy: FailurePolicy::default(),
            cancel: None,
        }
    }

    pub fn from_config(config: &Config, total: u64) -> Self {
        Self {
            total,
            concurrency: config.concurrency_for(total),
            policy: config.failure_policy(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Insert `run.total` records into `backend` and time it.
///
/// Keys are generated before the clock starts; each record is stamped with
/// its insert time inside the timed section.
pub async fn run_benchmark(backend: Arc<dyn InsertBackend>, run: &BenchRun) -> Result<BenchReport> {
    let workload = Workload::generate(run.total);

    let mut dispatcher = Dispatcher::new(run.concurrency)?.with_policy(run.policy);
    if let Some(token) = &run.cancel {
        dispatcher = dispatcher.with_cancellation(token.clone());
    }

    info!(
        backend = backend.name(),
        total = run.total,
        concurrency = run.concurrency,
        "Starting insert batch"
    );

    let start = Instant::now();
    dispatcher
        .run(run.total, |index| {
            let backend = backend.clone();
            let workload = workload.clone();
            async move {
                let record = workload.record(index).ok_or(BenchError::IndexOutOfRange(index))?;
                backend.insert(&record).await
            }
        })
        .await?;
    let elapsed = start.elapsed();

    let report = BenchReport::new(backend.name(), run.total, run.concurrency, elapsed);
    info!(
        backend = backend.name(),
        total = run.total,
        elapsed_ms = elapsed.as_millis() as u64,
        inserts_per_sec = report.inserts_per_sec(),
        "Insert batch finished"
    );
    Ok(report)
}
