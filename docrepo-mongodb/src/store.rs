use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use mongodb::{
    Client, Database as MongoDatabase,
    options::{ClientOptions, ReadPreference, SelectionCriteria},
};
use tracing::debug;

use docrepo_core::{
    backend::{DatabaseBackend, DatabaseBackendBuilder},
    config::ConnectionConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    options::CollectionOptions,
};

use crate::{collection::MongoDbCollection, convert::IntoDriver};

/// A MongoDB client bound to one database.
#[derive(Debug, Clone)]
pub struct MongoDbBackend {
    client: Client,
    database: MongoDatabase,
}

impl MongoDbBackend {
    /// Wraps an already constructed client.
    pub fn new(client: Client, database: &str) -> Self {
        Self {
            database: client.database(database),
            client,
        }
    }

    pub fn builder(config: ConnectionConfig) -> MongoDbBackendBuilder {
        MongoDbBackendBuilder::new(config)
    }

    /// Returns the driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the driver database.
    pub fn database(&self) -> &MongoDatabase {
        &self.database
    }
}

#[async_trait]
impl DatabaseBackend for MongoDbBackend {
    type Collection = MongoDbCollection;

    fn name(&self) -> &str {
        self.database.name()
    }

    fn collection(&self, name: &str, options: CollectionOptions) -> Self::Collection {
        MongoDbCollection::new(
            self.client.clone(),
            self.database
                .collection_with_options(name, options.into_driver()),
        )
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(())
    }

    async fn disconnect(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builds a [`MongoDbBackend`] from a [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct MongoDbBackendBuilder {
    config: ConnectionConfig,
}

impl MongoDbBackendBuilder {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// The connection string handed to the driver.
    pub fn connection_string(&self) -> String {
        self.config.connection_string()
    }
}

#[async_trait]
impl DatabaseBackendBuilder for MongoDbBackendBuilder {
    type Backend = MongoDbBackend;

    fn database_name(&self) -> &str {
        &self.config.database
    }

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        self.config.validate()?;

        debug!(database = %self.config.database, "creating mongodb client");

        let options = ClientOptions::parse(self.config.connection_string())
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let client = Client::with_options(options)
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        Ok(MongoDbBackend::new(client, &self.config.database))
    }

    fn connect_timeout(&self) -> Duration {
        self.config.connect_timeout
    }

    fn disconnect_timeout(&self) -> Duration {
        self.config.disconnect_timeout
    }
}
