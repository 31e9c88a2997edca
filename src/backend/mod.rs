// Insert backends behind a single capability trait
pub mod memory;
#[cfg(feature = "cassandra")]
pub mod cassandra;
#[cfg(feature = "mongo")]
pub mod mongo;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use serde::Serialize;

use crate::config::Config;
use crate::error::{BenchError, Result};
use crate::workload::UserRecord;

pub use memory::MemoryBackend;
#[cfg(feature = "cassandra")]
pub use cassandra::{CassandraBackend, CassandraOptions};
#[cfg(feature = "mongo")]
pub use mongo::{MongoBackend, MongoOptions};

/// A database that can store one [`UserRecord`] per call.
#[async_trait]
pub trait InsertBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert(&self, record: &UserRecord) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cassandra,
    Mongo,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cassandra => "cassandra",
            BackendKind::Mongo => "mongo",
            BackendKind::Memory => "memory",
        }
    }

    /// Open a backend sized for a batch of `total` inserts.
    pub async fn connect(self, config: &Config, total: u64) -> Result<Arc<dyn InsertBackend>> {
        match self {
            BackendKind::Memory => Ok(Arc::new(MemoryBackend::with_latency(config.memory_latency()))),
            #[cfg(feature = "cassandra")]
            BackendKind::Cassandra => {
                let options = CassandraOptions::from_config(config, total);
                Ok(Arc::new(CassandraBackend::connect(&options).await?))
            }
            #[cfg(feature = "mongo")]
            BackendKind::Mongo => {
                let options = MongoOptions::from_config(config);
                Ok(Arc::new(MongoBackend::connect(&options).await?))
            }
            #[allow(unreachable_patterns)]
            other => {
                let _ = total;
                Err(BenchError::BackendUnavailable(format!(
                    "{} support was not compiled in (enable the `{}` feature)",
                    other, other
                )))
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::Cassandra.to_string(), "cassandra");
        assert_eq!(BackendKind::Mongo.as_str(), "mongo");
        assert_eq!(BackendKind::from_str("memory", true).unwrap(), BackendKind::Memory);
        assert_eq!(serde_json::to_string(&BackendKind::Mongo).unwrap(), "\"mongo\"");
    }
}
