//! The collection handle.
//!
//! A [`Collection`] wraps one backend collection and exposes one method per supported
//! operation. Payloads and options are forwarded to the backend untouched, and results and
//! errors come back exactly as the backend produced them.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use docrepo::options::{FindOptions, UpdateOptions};
//!
//! let users = database.collection("users", None);
//!
//! users.insert_one(&doc! { "name": "Alice", "age": 30 }, None).await?;
//! users
//!     .update_one(doc! { "name": "Alice" }, doc! { "$inc": { "age": 1 } }, None)
//!     .await?;
//!
//! let adults = users
//!     .find(doc! { "age": { "$gte": 18 } }, FindOptions::default().with_limit(10))
//!     .await?
//!     .collect_documents()
//!     .await?;
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
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

/// A handle to one named collection.
///
/// # Type Parameters
///
/// * `C` - The backend collection type
#[derive(Debug, Clone)]
pub struct Collection<C: CollectionBackend> {
    inner: C,
}

/// A collection handle with the backend type erased.
pub type DynCollection = Collection<Box<dyn CollectionBackend>>;

impl<C: CollectionBackend> Collection<C> {
    pub(crate) fn new(inner: C) -> Self {
        Self { inner }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the backend collection for driver-specific calls.
    pub fn backend(&self) -> &C {
        &self.inner
    }

    /// Erases the backend type so handles from different backends can share one type.
    pub fn into_dyn(self) -> DynCollection
    where
        C: 'static,
    {
        Collection::new(Box::new(self.inner))
    }

    /// Drops the collection and every document in it.
    pub async fn drop(&self) -> DocumentStoreResult<()> {
        self.inner.drop().await
    }

    /// Runs an aggregation pipeline.
    pub async fn aggregate(
        &self,
        pipeline: impl IntoIterator<Item = Document>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> DocumentStoreResult<Cursor> {
        self.inner
            .aggregate(
                pipeline.into_iter().collect(),
                options.into().unwrap_or_default(),
            )
            .await
    }

    /// Returns a cursor over every document matching `filter`.
    pub async fn find(
        &self,
        filter: Document,
        options: impl Into<Option<FindOptions>>,
    ) -> DocumentStoreResult<Cursor> {
        self.inner
            .find(filter, options.into().unwrap_or_default())
            .await
    }

    /// Returns the first document matching `filter`, if any.
    pub async fn find_one(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.inner
            .find_one(filter, options.into().unwrap_or_default())
            .await
    }

    /// Like [`find_one`](Self::find_one), decoding the document into `T`.
    pub async fn find_one_as<T>(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneOptions>>,
    ) -> DocumentStoreResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        self.find_one(filter, options)
            .await?
            .map(|document| {
                deserialize_from_bson::<T>(Bson::Document(document)).map_err(DocumentStoreError::from)
            })
            .transpose()
    }

    /// Submits several writes in one request.
    pub async fn bulk_write(
        &self,
        models: impl IntoIterator<Item = WriteModel>,
        options: impl Into<Option<BulkWriteOptions>>,
    ) -> DocumentStoreResult<BulkWriteResult> {
        self.inner
            .bulk_write(
                models.into_iter().collect(),
                options.into().unwrap_or_default(),
            )
            .await
    }

    pub async fn count_documents(
        &self,
        filter: Document,
        options: impl Into<Option<CountOptions>>,
    ) -> DocumentStoreResult<u64> {
        self.inner
            .count_documents(filter, options.into().unwrap_or_default())
            .await
    }

    pub async fn delete_one(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DocumentStoreResult<DeleteResult> {
        self.inner
            .delete_one(filter, options.into().unwrap_or_default())
            .await
    }

    pub async fn delete_many(
        &self,
        filter: Document,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DocumentStoreResult<DeleteResult> {
        self.inner
            .delete_many(filter, options.into().unwrap_or_default())
            .await
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> DocumentStoreResult<UpdateResult> {
        self.inner
            .update_many(filter, update.into(), options.into().unwrap_or_default())
            .await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> DocumentStoreResult<UpdateResult> {
        self.inner
            .update_one(filter, update.into(), options.into().unwrap_or_default())
            .await
    }

    /// Inserts every item, serialized to BSON documents.
    pub async fn insert_many<T>(
        &self,
        documents: impl IntoIterator<Item = T>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> DocumentStoreResult<InsertManyResult>
    where
        T: Serialize,
    {
        self.inner
            .insert_many(
                documents
                    .into_iter()
                    .map(|document| to_document(&document))
                    .collect::<DocumentStoreResult<Vec<_>>>()?,
                options.into().unwrap_or_default(),
            )
            .await
    }

    /// Inserts one item, serialized to a BSON document.
    pub async fn insert_one<T>(
        &self,
        document: &T,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> DocumentStoreResult<InsertOneResult>
    where
        T: Serialize + ?Sized,
    {
        self.inner
            .insert_one(to_document(document)?, options.into().unwrap_or_default())
            .await
    }

    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<FindOneAndUpdateOptions>>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.inner
            .find_one_and_update(filter, update.into(), options.into().unwrap_or_default())
            .await
    }

    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: impl Into<Option<FindOneAndDeleteOptions>>,
    ) -> DocumentStoreResult<Option<Document>> {
        self.inner
            .find_one_and_delete(filter, options.into().unwrap_or_default())
            .await
    }
}

fn to_document<T>(value: &T) -> DocumentStoreResult<Document>
where
    T: Serialize + ?Sized,
{
    match serialize_to_bson(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
    }
}
