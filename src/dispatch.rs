//! Bounded concurrent fan-out.
//!
//! [`Dispatcher`] runs one asynchronous action per index in `[0, total)` as a
//! tokio task, holding a semaphore permit for the whole life of each task so
//! that no more than `concurrency` actions are ever in flight. The call
//! returns only after every started task has settled.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Error type carried by a failed action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What to do with the rest of a batch once an action has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Run every index to completion and report all failures at the end.
    #[default]
    Collect,
    /// Stop scheduling new indices after the first failure. Actions already
    /// started still run to completion.
    FailFast,
}

/// One failed invocation.
#[derive(Debug, Error)]
#[error("action {index} failed: {source}")]
pub struct ActionFailure {
    pub index: u64,
    #[source]
    pub source: BoxError,
}

/// An action that panicked instead of returning.
#[derive(Debug, Error)]
#[error("action panicked: {0}")]
pub struct Panicked(pub String);

impl Panicked {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Panicked(message)
    }
}

/// Every failure observed in a batch, ordered by index. Never empty.
#[derive(Debug)]
pub struct AggregateFailure {
    failures: Vec<ActionFailure>,
}

impl AggregateFailure {
    fn new(mut failures: Vec<ActionFailure>) -> Self {
        debug_assert!(!failures.is_empty());
        failures.sort_by_key(|f| f.index);
        Self { failures }
    }

    pub fn failures(&self) -> &[ActionFailure] {
        &self.failures
    }

    /// The failure with the lowest index.
    pub fn first(&self) -> &ActionFailure {
        &self.failures[0]
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.failures.iter().map(|f| f.index)
    }

    pub fn into_failures(self) -> Vec<ActionFailure> {
        self.failures
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.first();
        write!(
            f,
            "{} action(s) failed, first at index {}: {}",
            self.failures.len(),
            first.index,
            first.source
        )
    }
}

impl std::error::Error for AggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.first())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),

    #[error("dispatch cancelled after {started} of {total} actions were started")]
    Cancelled {
        started: u64,
        total: u64,
        failures: Vec<ActionFailure>,
    },

    #[error("dispatch task was aborted by the runtime: {0}")]
    Join(#[from] JoinError),
}

/// Outcome of a batch in which every action succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: u64,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    concurrency: usize,
    policy: FailurePolicy,
    cancel: Option<CancellationToken>,
}

impl Dispatcher {
    pub fn new(concurrency: usize) -> Result<Self, DispatchError> {
        if concurrency == 0 {
            return Err(DispatchError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if concurrency > Semaphore::MAX_PERMITS {
            return Err(DispatchError::InvalidArgument(format!(
                "concurrency {} exceeds the maximum of {}",
                concurrency,
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            concurrency,
            policy: FailurePolicy::default(),
            cancel: None,
        })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop scheduling new actions once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Invoke `action` for every index in `[0, total)` and wait for all of them.
    ///
    /// `action` is called on the dispatching task, in ascending index order,
    /// only after a permit is available. The future it returns is spawned and
    /// keeps the permit until it settles.
    pub async fn run<F, Fut, E>(&self, total: u64, mut action: F) -> Result<DispatchSummary, DispatchError>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        if total == 0 {
            return Ok(DispatchSummary { completed: 0 });
        }

        let permits = usize::try_from(total).map_or(self.concurrency, |t| t.min(self.concurrency));
        let semaphore = Arc::new(Semaphore::new(permits));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut batch = Batch::default();
        let mut started = 0u64;
        let mut cancelled = false;

        debug!(total, concurrency = self.concurrency, policy = ?self.policy, "dispatch started");

        for index in 0..total {
            let acquired = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        cancelled = true;
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => permit,
                },
                None => semaphore.clone().acquire_owned().await,
            };
            // The semaphore is owned by this call and never closed.
            let Ok(permit) = acquired else { break };

            while let Some(joined) = tasks.try_join_next() {
                batch.settle(joined);
            }

            if self.policy == FailurePolicy::FailFast && failed.load(Ordering::Acquire) {
                debug!(index, "failure observed, no further actions scheduled");
                break;
            }

            let fut = action(index);
            let failed = failed.clone();
            started += 1;
            tasks.spawn(async move {
                let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.into()),
                    Err(payload) => Err(Box::new(Panicked::from_payload(payload)) as BoxError),
                };
                if outcome.is_err() {
                    failed.store(true, Ordering::Release);
                }
                drop(permit);
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            batch.settle(joined);
        }

        debug!(total, started, completed = batch.completed, failed = batch.failures.len(), "dispatch finished");

        if let Some(e) = batch.aborted {
            return Err(DispatchError::Join(e));
        }
        if cancelled {
            warn!(started, total, "dispatch cancelled");
            return Err(DispatchError::Cancelled {
                started,
                total,
                failures: batch.failures,
            });
        }
        if !batch.failures.is_empty() {
            let aggregate = AggregateFailure::new(batch.failures);
            warn!(failed = aggregate.len(), first = aggregate.first().index, "dispatch failed");
            return Err(aggregate.into());
        }
        Ok(DispatchSummary {
            completed: batch.completed,
        })
    }
}

#[derive(Default)]
struct Batch {
    completed: u64,
    failures: Vec<ActionFailure>,
    aborted: Option<JoinError>,
}

impl Batch {
    fn settle(&mut self, joined: Result<(u64, Result<(), BoxError>), JoinError>) {
        match joined {
            Ok((_, Ok(()))) => self.completed += 1,
            Ok((index, Err(source))) => {
                debug!(index, error = %source, "action failed");
                self.failures.push(ActionFailure { index, source });
            }
            // Panics are caught inside the task, so this is runtime shutdown.
            Err(e) => {
                if self.aborted.is_none() {
                    self.aborted = Some(e);
                }
            }
        }
    }
}

/// Run `action` for every index in `[0, total)` with at most `concurrency`
/// in flight, collecting every failure.
pub async fn dispatch<F, Fut, E>(total: u64, concurrency: usize, action: F) -> Result<DispatchSummary, DispatchError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    Dispatcher::new(concurrency)?.run(total, action).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = Dispatcher::new(0).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }

    #[test]
    fn test_default_policy_collects() {
        let dispatcher = Dispatcher::new(4).unwrap();
        assert_eq!(dispatcher.policy(), FailurePolicy::Collect);
        assert_eq!(dispatcher.concurrency(), 4);
    }

    #[test]
    fn test_aggregate_sorted_and_displayed() {
        let failures = vec![
            ActionFailure { index: 9, source: Box::new(io::Error::other("late")) },
            ActionFailure { index: 2, source: Box::new(io::Error::other("early")) },
        ];
        let aggregate = AggregateFailure::new(failures);
        assert_eq!(aggregate.indices().collect::<Vec<_>>(), vec![2, 9]);
        assert_eq!(aggregate.first().index, 2);
        assert_eq!(aggregate.to_string(), "2 action(s) failed, first at index 2: early");
    }

    #[test]
    fn test_panic_payload_message() {
        let p = Panicked::from_payload(Box::new("boom"));
        assert_eq!(p.0, "boom");
        let p = Panicked::from_payload(Box::new(String::from("bang")));
        assert_eq!(p.0, "bang");
        let p = Panicked::from_payload(Box::new(42u8));
        assert_eq!(p.0, "non-string panic payload");
    }

    #[tokio::test]
    async fn test_empty_batch_never_invokes() {
        let summary = dispatch(0, 1, |_| async { Err::<(), _>(io::Error::other("must not run")) })
            .await
            .unwrap();
        assert_eq!(summary.completed, 0);
    }
}
