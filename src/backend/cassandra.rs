use std::num::NonZeroUsize;

use async_trait::async_trait;
use scylla::client::PoolSize;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::statement::Consistency;
use scylla::statement::prepared::PreparedStatement;
use tracing::info;

use super::InsertBackend;
use crate::config::Config;
use crate::error::{BenchError, Result};
use crate::workload::UserRecord;

/// Connections per host for a batch of `total` inserts: one per `divisor`
/// inserts, never fewer than one.
pub fn connections_for(total: u64, divisor: u64) -> NonZeroUsize {
    let connections = total / divisor.max(1);
    let connections = usize::try_from(connections).unwrap_or(usize::MAX);
    NonZeroUsize::new(connections).unwrap_or(NonZeroUsize::MIN)
}

pub fn insert_statement(table: &str) -> String {
    format!("INSERT INTO {}(col0,col1,col2,col3,col4) VALUES (?,?,?,?,?)", table)
}

#[derive(Debug, Clone)]
pub struct CassandraOptions {
    pub contact_points: Vec<String>,
    pub keyspace: String,
    pub table: String,
    pub connections_per_host: NonZeroUsize,
}

impl CassandraOptions {
    pub fn from_config(config: &Config, total: u64) -> Self {
        Self {
            contact_points: config.cassandra_contact_points.clone(),
            keyspace: config.cassandra_keyspace.clone(),
            table: config.cassandra_table.clone(),
            connections_per_host: connections_for(total, config.cassandra_connections_divisor),
        }
    }
}

/// CQL session with one prepared insert, consistency ONE and plain
/// round-robin host selection.
pub struct CassandraBackend {
    session: Session,
    insert: PreparedStatement,
}

impl CassandraBackend {
    pub async fn connect(options: &CassandraOptions) -> Result<Self> {
        info!(
            contact_points = ?options.contact_points,
            keyspace = %options.keyspace,
            connections_per_host = options.connections_per_host.get(),
            "Connecting to Cassandra"
        );

        let load_balancing = DefaultPolicy::builder().token_aware(false).build();
        let profile = ExecutionProfile::builder()
            .consistency(Consistency::One)
            .load_balancing_policy(load_balancing)
            .build();

        let session: Session = SessionBuilder::new()
            .known_nodes(&options.contact_points)
            .pool_size(PoolSize::PerHost(options.connections_per_host))
            .default_execution_profile_handle(profile.into_handle())
            .use_keyspace(&options.keyspace, false)
            .build()
            .await
            .map_err(|e| BenchError::Cassandra(format!("failed to open session: {}", e)))?;

        let mut insert = session
            .prepare(insert_statement(&options.table))
            .await
            .map_err(|e| BenchError::Cassandra(format!("failed to prepare insert: {}", e)))?;
        insert.set_consistency(Consistency::One);

        Ok(Self { session, insert })
    }
}

#[async_trait]
impl InsertBackend for CassandraBackend {
    fn name(&self) -> &'static str {
        "cassandra"
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        let values = (
            record.col0,
            record.col1.as_str(),
            record.col2,
            record.col3,
            record.col4.as_str(),
        );
        self.session
            .execute_unpaged(&self.insert, values)
            .await
            .map_err(|e| BenchError::Cassandra(e.to_string()))?;
        Ok(())
    }
}
