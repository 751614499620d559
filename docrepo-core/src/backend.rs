//! Backend abstraction for the repository layer.
//!
//! This module defines the capability set a database driver adapter implements. Callers only
//! ever talk to [`Database`](crate::database::Database) and
//! [`Collection`](crate::collection::Collection); swapping the backend (a live MongoDB
//! deployment, an in-memory test double) does not touch them.
//!
//! # Traits
//!
//! - [`DatabaseBackend`]: A connected client with one selected database
//! - [`CollectionBackend`]: One named collection, one method per supported operation
//! - [`DatabaseBackendBuilder`]: Factory that establishes the connection
//!
//! # Contract
//!
//! Collection operations are pass-through: implementers forward the payload and options to
//! the driver unchanged and return what the driver returns. Driver errors are wrapped with
//! [`DocumentStoreError::backend`](crate::error::DocumentStoreError::backend) without
//! reclassification, and no retry or batching is added.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use bson::Document;

use crate::{
    config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_DISCONNECT_TIMEOUT},
    cursor::Cursor,
    error::DocumentStoreResult,
    model::{UpdateModifications, WriteModel},
    options::{
        AggregateOptions, BulkWriteOptions, CollectionOptions, CountOptions, DeleteOptions,
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
        InsertManyOptions, InsertOneOptions, UpdateOptions,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
};

/// A connected client bound to one database.
///
/// # Thread Safety
///
/// Implementations are shared by every collection handle derived from them and must support
/// concurrent use without external locking.
#[async_trait]
pub trait DatabaseBackend: Send + Sync + Debug {
    /// The collection type handed out by this backend.
    type Collection: CollectionBackend + 'static;

    /// Returns the name of the selected database.
    fn name(&self) -> &str;

    /// Returns a handle to the named collection.
    ///
    /// No existence check is made; collections are created implicitly on first write.
    fn collection(&self, name: &str, options: CollectionOptions) -> Self::Collection;

    /// Checks that the primary is reachable.
    async fn ping(&self) -> DocumentStoreResult<()>;

    /// Releases the client and its connections.
    ///
    /// The default implementation is a no-op, but backends holding external connections
    /// should override this.
    async fn disconnect(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Establishes a backend connection.
#[async_trait]
pub trait DatabaseBackendBuilder: Send {
    type Backend: DatabaseBackend;

    /// Name of the database the built backend will select.
    fn database_name(&self) -> &str;

    /// Validates the configuration and creates the client. Implementations must fail before
    /// any network call when the configuration is unusable.
    async fn build(self) -> DocumentStoreResult<Self::Backend>;

    /// Bound applied to [`build`](Self::build) and the first health check together.
    fn connect_timeout(&self) -> Duration {
        DEFAULT_CONNECT_TIMEOUT
    }

    /// Bound applied to disconnecting the built backend.
    fn disconnect_timeout(&self) -> Duration {
        DEFAULT_DISCONNECT_TIMEOUT
    }
}

/// One named collection.
///
/// Every operation accepts the payload and the option set the driver defines for the
/// equivalent call. Cancellation is caller-driven: dropping the returned future abandons the
/// operation.
#[async_trait]
pub trait CollectionBackend: Send + Sync + Debug {
    /// Returns the name of this collection.
    fn name(&self) -> &str;

    /// Drops the collection and all of its documents.
    async fn drop(&self) -> DocumentStoreResult<()>;

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> DocumentStoreResult<Cursor>;

    async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Cursor>;

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    async fn bulk_write(
        &self,
        models: Vec<WriteModel>,
        options: BulkWriteOptions,
    ) -> DocumentStoreResult<BulkWriteResult>;

    async fn count_documents(
        &self,
        filter: Document,
        options: CountOptions,
    ) -> DocumentStoreResult<u64>;

    async fn delete_one(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult>;

    async fn delete_many(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult>;

    async fn update_many(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult>;

    async fn update_one(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult>;

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> DocumentStoreResult<InsertManyResult>;

    async fn insert_one(
        &self,
        document: Document,
        options: InsertOneOptions,
    ) -> DocumentStoreResult<InsertOneResult>;

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>>;

    async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>>;
}

#[async_trait]
impl<C> CollectionBackend for Box<C>
where
    C: CollectionBackend + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn drop(&self) -> DocumentStoreResult<()> {
        (**self).drop().await
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> DocumentStoreResult<Cursor> {
        (**self).aggregate(pipeline, options).await
    }

    async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Cursor> {
        (**self).find(filter, options).await
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one(filter, options).await
    }

    async fn bulk_write(
        &self,
        models: Vec<WriteModel>,
        options: BulkWriteOptions,
    ) -> DocumentStoreResult<BulkWriteResult> {
        (**self).bulk_write(models, options).await
    }

    async fn count_documents(
        &self,
        filter: Document,
        options: CountOptions,
    ) -> DocumentStoreResult<u64> {
        (**self).count_documents(filter, options).await
    }

    async fn delete_one(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        (**self).delete_one(filter, options).await
    }

    async fn delete_many(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        (**self).delete_many(filter, options).await
    }

    async fn update_many(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        (**self).update_many(filter, update, options).await
    }

    async fn update_one(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        (**self).update_one(filter, update, options).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> DocumentStoreResult<InsertManyResult> {
        (**self).insert_many(documents, options).await
    }

    async fn insert_one(
        &self,
        document: Document,
        options: InsertOneOptions,
    ) -> DocumentStoreResult<InsertOneResult> {
        (**self).insert_one(document, options).await
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one_and_update(filter, update, options).await
    }

    async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        (**self).find_one_and_delete(filter, options).await
    }
}
