use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const COL1_VALUE: &str = "123456";
pub const COL3_VALUE: i32 = 1;
pub const COL4_VALUE: &str = "1234 some log message goes here. Hello world. 123334556567586978089-==00";

/// One row of the benchmark table (`col0` is the primary key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub col0: Uuid,
    pub col1: String,
    pub col2: DateTime<Utc>,
    pub col3: i32,
    pub col4: String,
}

impl UserRecord {
    /// Build the fixed-shape record for `key`, stamped with the current time
    pub fn new(key: Uuid) -> Self {
        Self {
            col0: key,
            col1: COL1_VALUE.to_string(),
            col2: Utc::now(),
            col3: COL3_VALUE,
            col4: COL4_VALUE.to_string(),
        }
    }
}

/// Primary keys for one batch, generated up front so key generation stays
/// outside the timed section.
#[derive(Debug, Clone)]
pub struct Workload {
    keys: Arc<[Uuid]>,
}

impl Workload {
    pub fn generate(total: u64) -> Self {
        let keys: Arc<[Uuid]> = (0..total).map(|_| Uuid::new_v4()).collect();
        Self { keys }
    }

    pub fn len(&self) -> u64 {
        self.keys.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, index: u64) -> Option<Uuid> {
        let index = usize::try_from(index).ok()?;
        self.keys.get(index).copied()
    }

    pub fn record(&self, index: u64) -> Option<UserRecord> {
        self.key(index).map(UserRecord::new)
    }
}
