use clap::Parser;
use std::time::Duration;

use crate::backend::BackendKind;
use crate::dispatch::FailurePolicy;
use crate::error::{BenchError, Result};
use crate::report::ReportFormat;

#[derive(Parser, Debug, Clone)]
#[command(name = "insertbench")]
#[command(about = "insertbench - concurrent single-row insert throughput against Cassandra and MongoDB", long_about = None)]
pub struct Config {
    // Run selection
    #[arg(short, long = "backend", value_enum, value_delimiter = ',', default_values_t = [BackendKind::Cassandra, BackendKind::Mongo], env = "INSERTBENCH_BACKENDS", help = "Backends to benchmark, in order")]
    pub backends: Vec<BackendKind>,

    #[arg(short = 'n', long, value_delimiter = ',', default_values_t = [100u64, 1000, 10000, 100000, 1000000], env = "INSERTBENCH_COUNTS", help = "Batch sizes to run, in order")]
    pub counts: Vec<u64>,

    #[arg(short, long, env = "INSERTBENCH_CONCURRENCY", help = "Maximum inserts in flight (default: the batch size)")]
    pub concurrency: Option<usize>,

    #[arg(long, env = "INSERTBENCH_FAIL_FAST", help = "Stop scheduling inserts after the first failure")]
    pub fail_fast: bool,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text, env = "INSERTBENCH_FORMAT")]
    pub format: ReportFormat,

    #[arg(long, default_value = "info", env = "INSERTBENCH_LOG_LEVEL")]
    pub log_level: String,

    // Cassandra
    #[arg(long, value_delimiter = ',', default_value = "localhost:9042", env = "INSERTBENCH_CASSANDRA_CONTACT_POINTS")]
    pub cassandra_contact_points: Vec<String>,

    #[arg(long, default_value = "keyspace1", env = "INSERTBENCH_CASSANDRA_KEYSPACE")]
    pub cassandra_keyspace: String,

    #[arg(long, default_value = "table1", env = "INSERTBENCH_CASSANDRA_TABLE")]
    pub cassandra_table: String,

    #[arg(long, default_value = "2048", env = "INSERTBENCH_CASSANDRA_CONNECTIONS_DIVISOR", help = "Open one connection per host for every N inserts in the batch")]
    pub cassandra_connections_divisor: u64,

    // MongoDB
    #[arg(long, default_value = "mongodb://localhost:27017", env = "INSERTBENCH_MONGO_URI")]
    pub mongo_uri: String,

    #[arg(long, default_value = "local", env = "INSERTBENCH_MONGO_DATABASE")]
    pub mongo_database: String,

    #[arg(long, default_value = "collection1", env = "INSERTBENCH_MONGO_COLLECTION")]
    pub mongo_collection: String,

    #[arg(long, default_value = "1", env = "INSERTBENCH_MONGO_MIN_POOL_SIZE")]
    pub mongo_min_pool_size: u32,

    #[arg(long, default_value = "512", env = "INSERTBENCH_MONGO_MAX_POOL_SIZE")]
    pub mongo_max_pool_size: u32,

    #[arg(long, default_value = "3600", env = "INSERTBENCH_MONGO_WAIT_TIMEOUT_SECS", help = "Server selection timeout in seconds")]
    pub mongo_wait_timeout_secs: u64,

    // In-process backend
    #[arg(long, default_value = "0", env = "INSERTBENCH_MEMORY_LATENCY_MS", help = "Artificial per-insert latency for the memory backend")]
    pub memory_latency_ms: u64,
}

impl Config {
    /// Get a configuration instance with all values resolved from CLI args and environment variables
    pub fn load() -> Self {
        Config::parse()
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            return Err(BenchError::InvalidConfig("at least one backend is required".to_string()));
        }
        if self.counts.is_empty() {
            return Err(BenchError::InvalidConfig("at least one batch size is required".to_string()));
        }
        if self.concurrency == Some(0) {
            return Err(BenchError::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if self.cassandra_connections_divisor == 0 {
            return Err(BenchError::InvalidConfig("cassandra connections divisor must be at least 1".to_string()));
        }
        if self.mongo_min_pool_size > self.mongo_max_pool_size {
            return Err(BenchError::InvalidConfig(format!(
                "mongo min pool size {} exceeds max pool size {}",
                self.mongo_min_pool_size, self.mongo_max_pool_size
            )));
        }
        Ok(())
    }

    /// In-flight ceiling for a batch of `total`: the configured value, or the
    /// whole batch at once.
    pub fn concurrency_for(&self, total: u64) -> usize {
        self.concurrency
            .unwrap_or_else(|| usize::try_from(total.max(1)).unwrap_or(usize::MAX))
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Collect
        }
    }

    /// Get the MongoDB server selection timeout as Duration
    pub fn mongo_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.mongo_wait_timeout_secs)
    }

    /// Get the memory backend latency as Duration
    pub fn memory_latency(&self) -> Duration {
        Duration::from_millis(self.memory_latency_ms)
    }
}
