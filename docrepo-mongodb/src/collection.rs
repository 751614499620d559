use async_trait::async_trait;
use bson::Document;
use futures::TryStreamExt;
use mongodb::{Client, Collection as MongoCollection};
use tracing::debug;

use docrepo_core::{
    backend::CollectionBackend,
    cursor::Cursor,
    error::{DocumentStoreError, DocumentStoreResult},
    model::{UpdateModifications, WriteModel},
    options::{
        AggregateOptions, BulkWriteOptions, CountOptions, DeleteOptions, FindOneAndDeleteOptions,
        FindOneAndUpdateOptions, FindOneOptions, FindOptions, InsertManyOptions,
        InsertOneOptions, UpdateOptions,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
};

use crate::convert::{FromDriver, IntoDriver, write_model};

/// A MongoDB collection. Every operation is a direct call on the driver collection.
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    client: Client,
    collection: MongoCollection<Document>,
}

impl MongoDbCollection {
    pub(crate) fn new(client: Client, collection: MongoCollection<Document>) -> Self {
        Self { client, collection }
    }

    /// Returns the driver collection.
    pub fn inner(&self) -> &MongoCollection<Document> {
        &self.collection
    }
}

#[async_trait]
impl CollectionBackend for MongoDbCollection {
    fn name(&self) -> &str {
        self.collection.name()
    }

    async fn drop(&self) -> DocumentStoreResult<()> {
        self.collection
            .drop()
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        options: AggregateOptions,
    ) -> DocumentStoreResult<Cursor> {
        let cursor = self
            .collection
            .aggregate(pipeline)
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(Cursor::new(cursor.map_err(DocumentStoreError::backend)))
    }

    async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Cursor> {
        let cursor = self
            .collection
            .find(filter)
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)?;

        Ok(Cursor::new(cursor.map_err(DocumentStoreError::backend)))
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.collection
            .find_one(filter)
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn bulk_write(
        &self,
        models: Vec<WriteModel>,
        options: BulkWriteOptions,
    ) -> DocumentStoreResult<BulkWriteResult> {
        let namespace = self.collection.namespace();

        debug!(collection = %self.name(), models = models.len(), "submitting bulk write");

        let mut action = self.client.bulk_write(
            models
                .into_iter()
                .map(|model| write_model(&namespace, model))
                .collect::<Vec<_>>(),
        );
        if let Some(ordered) = options.ordered {
            action = action.ordered(ordered);
        }
        if let Some(bypass) = options.bypass_document_validation {
            action = action.bypass_document_validation(bypass);
        }

        let result = action.await.map_err(DocumentStoreError::backend)?;

        Ok(BulkWriteResult {
            inserted_count: result.inserted_count.max(0) as u64,
            matched_count: result.matched_count.max(0) as u64,
            modified_count: result.modified_count.max(0) as u64,
            deleted_count: result.deleted_count.max(0) as u64,
            upserted_count: result.upserted_count.max(0) as u64,
        })
    }

    async fn count_documents(
        &self,
        filter: Document,
        options: CountOptions,
    ) -> DocumentStoreResult<u64> {
        self.collection
            .count_documents(filter)
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn delete_one(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        self.collection
            .delete_one(filter)
            .with_options(options.into_driver())
            .await
            .map(DeleteResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn delete_many(
        &self,
        filter: Document,
        options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        self.collection
            .delete_many(filter)
            .with_options(options.into_driver())
            .await
            .map(DeleteResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn update_many(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.collection
            .update_many(filter, update.into_driver())
            .with_options(options.into_driver())
            .await
            .map(UpdateResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn update_one(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        self.collection
            .update_one(filter, update.into_driver())
            .with_options(options.into_driver())
            .await
            .map(UpdateResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> DocumentStoreResult<InsertManyResult> {
        self.collection
            .insert_many(documents)
            .with_options(options.into_driver())
            .await
            .map(InsertManyResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn insert_one(
        &self,
        document: Document,
        options: InsertOneOptions,
    ) -> DocumentStoreResult<InsertOneResult> {
        self.collection
            .insert_one(document)
            .with_options(options.into_driver())
            .await
            .map(InsertOneResult::from_driver)
            .map_err(DocumentStoreError::backend)
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.collection
            .find_one_and_update(filter, update.into_driver())
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)
    }

    async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.collection
            .find_one_and_delete(filter)
            .with_options(options.into_driver())
            .await
            .map_err(DocumentStoreError::backend)
    }
}
