pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod report;
pub mod runner;
pub mod workload;

pub use backend::{BackendKind, InsertBackend, MemoryBackend};
pub use dispatch::{
    ActionFailure, AggregateFailure, DispatchError, DispatchSummary, Dispatcher, FailurePolicy, dispatch,
};
pub use error::{BenchError, Result};
pub use report::{BenchReport, ReportFormat};
pub use runner::{BenchRun, run_benchmark};
pub use workload::{UserRecord, Workload};
