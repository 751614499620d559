//! The database handle.
//!
//! A [`Database`] is created once during process bootstrap with [`Database::connect`], hands
//! out [`Collection`] handles for the life of the process, and is consumed by
//! [`Database::disconnect`] at shutdown.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{prelude::*, mongodb::MongoDbBackend};
//!
//! let config = ConnectionConfig::new("mongodb://localhost:27017", "app", true);
//! let database = Database::connect(MongoDbBackend::builder(config)).await?;
//! let orders = database.collection("orders", None);
//! // ...
//! database.disconnect().await?;
//! ```

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    backend::{DatabaseBackend, DatabaseBackendBuilder},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    options::CollectionOptions,
};

/// A connected database.
///
/// Holding a `Database` means the backend was built and answered exactly one health check
/// before the handle was returned.
#[derive(Debug)]
pub struct Database<B: DatabaseBackend> {
    backend: B,
    disconnect_timeout: Duration,
}

impl<B: DatabaseBackend> Database<B> {
    /// Connects through `builder` and verifies the primary is reachable.
    ///
    /// Building the backend and the health check share the builder's connect timeout.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::Configuration`] if the builder rejects its parameters
    /// - [`DocumentStoreError::Initialization`] if the client cannot be created or the
    ///   health check fails
    /// - [`DocumentStoreError::Timeout`] if the connect timeout elapses
    pub async fn connect<T>(builder: T) -> DocumentStoreResult<Self>
    where
        T: DatabaseBackendBuilder<Backend = B>,
    {
        let connect_timeout = builder.connect_timeout();
        let disconnect_timeout = builder.disconnect_timeout();

        info!(database = %builder.database_name(), "connecting to database");

        let backend = timeout(connect_timeout, async {
            let backend = builder.build().await?;

            if let Err(err) = backend.ping().await {
                warn!(database = %backend.name(), error = %err, "database health check failed");
                return Err(DocumentStoreError::Initialization(err.to_string()));
            }

            Ok(backend)
        })
        .await
        .map_err(|_| DocumentStoreError::Timeout {
            operation: "connect",
            timeout: connect_timeout,
        })??;

        info!(database = %backend.name(), "connected successfully");

        Ok(Self {
            backend,
            disconnect_timeout,
        })
    }

    /// Returns the name of the selected database.
    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Returns the underlying backend for driver-specific calls.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a handle to the named collection.
    ///
    /// Handles are cheap. Asking twice for the same name yields two independent handles over
    /// the same collection.
    pub fn collection(
        &self,
        name: &str,
        options: impl Into<Option<CollectionOptions>>,
    ) -> Collection<B::Collection> {
        debug!(database = %self.name(), collection = %name, "acquiring collection handle");

        Collection::new(
            self.backend
                .collection(name, options.into().unwrap_or_default()),
        )
    }

    /// Re-runs the primary reachability check.
    pub async fn ping(&self) -> DocumentStoreResult<()> {
        self.backend.ping().await
    }

    /// Releases the client.
    ///
    /// Consumes the handle, so it can be called at most once. Collection handles obtained
    /// earlier stay in memory but their operations fail afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Timeout`] if the release does not finish within the
    /// disconnect timeout, or whatever the backend reports.
    pub async fn disconnect(self) -> DocumentStoreResult<()> {
        let Self {
            backend,
            disconnect_timeout,
        } = self;
        let name = backend.name().to_string();

        info!(database = %name, "disconnecting from database");

        timeout(disconnect_timeout, backend.disconnect())
            .await
            .map_err(|_| DocumentStoreError::Timeout {
                operation: "disconnect",
                timeout: disconnect_timeout,
            })??;

        info!(database = %name, "disconnected successfully");

        Ok(())
    }
}
