use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{self, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::info;

use super::InsertBackend;
use crate::config::Config;
use crate::error::Result;
use crate::workload::UserRecord;

#[derive(Debug, Clone)]
pub struct MongoOptions {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    /// How long an insert may wait for a server before giving up.
    pub wait_timeout: Duration,
}

impl MongoOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            uri: config.mongo_uri.clone(),
            database: config.mongo_database.clone(),
            collection: config.mongo_collection.clone(),
            min_pool_size: config.mongo_min_pool_size,
            max_pool_size: config.mongo_max_pool_size,
            wait_timeout: config.mongo_wait_timeout(),
        }
    }
}

/// Map a record to its document; `col0` becomes the `_id`.
pub fn to_document(record: &UserRecord) -> Document {
    doc! {
        "_id": bson::Uuid::from_bytes(record.col0.into_bytes()),
        "col1": record.col1.as_str(),
        "col2": bson::DateTime::from_millis(record.col2.timestamp_millis()),
        "col3": record.col3,
        "col4": record.col4.as_str(),
    }
}

pub struct MongoBackend {
    collection: Collection<Document>,
}

impl MongoBackend {
    pub async fn connect(options: &MongoOptions) -> Result<Self> {
        info!(
            database = %options.database,
            collection = %options.collection,
            max_pool_size = options.max_pool_size,
            "Connecting to MongoDB"
        );

        let mut client_options = ClientOptions::parse(&options.uri).await?;
        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        client_options.min_pool_size = Some(options.min_pool_size);
        client_options.max_pool_size = Some(options.max_pool_size);
        client_options.server_selection_timeout = Some(options.wait_timeout);

        let client = Client::with_options(client_options)?;
        let collection = client
            .database(&options.database)
            .collection::<Document>(&options.collection);

        Ok(Self { collection })
    }
}

#[async_trait]
impl InsertBackend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongo"
    }

    async fn insert(&self, record: &UserRecord) -> Result<()> {
        self.collection.insert_one(to_document(record)).await?;
        Ok(())
    }
}
