//! In-memory database and collection backends.
//!
//! This module provides a backend that keeps every collection as a vector of BSON documents
//! behind an async-aware read-write lock. It mirrors the observable behaviour of a server for
//! the supported operator subset, which makes it a drop-in replacement for the MongoDB backend
//! in tests.

use std::{
    collections::HashMap,
    io,
    iter,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docrepo_core::{
    backend::{CollectionBackend, DatabaseBackend, DatabaseBackendBuilder},
    cursor::Cursor,
    error::{DocumentStoreError, DocumentStoreResult},
    model::{UpdateModifications, WriteModel},
    options::{
        AggregateOptions, BulkWriteOptions, CollectionOptions, CountOptions, DeleteOptions,
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
        InsertManyOptions, InsertOneOptions, ReturnDocument, UpdateOptions,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
};

use crate::{
    evaluator::{matches, values_equal},
    pipeline::{self, project, sort_indices},
    update,
};

type CollectionData = Vec<Document>;
type StoreMap = HashMap<String, CollectionData>;

#[derive(Debug, Default)]
struct ClientState {
    closed: AtomicBool,
    unreachable: bool,
    pings: AtomicU64,
}

impl ClientState {
    fn ensure_open(&self) -> DocumentStoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DocumentStoreError::ClientClosed);
        }
        Ok(())
    }
}

/// Thread-safe in-memory database.
///
/// Clones share the same documents and the same client state, so disconnecting one handle
/// closes every collection derived from it.
///
/// # Example
///
/// ```ignore
/// use docrepo::{prelude::*, memory::InMemoryDatabase};
/// use bson::doc;
///
/// let database = Database::connect(InMemoryDatabase::builder("app")).await?;
/// let users = database.collection("users", None);
///
/// users.insert_one(&doc! { "name": "Alice" }, None).await?;
/// assert_eq!(users.count_documents(doc! {}, None).await?, 1);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    name: String,
    store: Arc<RwLock<StoreMap>>,
    state: Arc<ClientState>,
}

impl InMemoryDatabase {
    pub fn builder(name: impl Into<String>) -> InMemoryDatabaseBuilder {
        InMemoryDatabaseBuilder::new(name)
    }

    /// Number of health checks this database has answered.
    pub fn ping_count(&self) -> u64 {
        self.state.pings.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    /// Names of the collections that have been written to and not dropped, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.store.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl DatabaseBackend for InMemoryDatabase {
    type Collection = InMemoryCollection;

    fn name(&self) -> &str {
        &self.name
    }

    fn collection(&self, name: &str, _options: CollectionOptions) -> Self::Collection {
        InMemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
            state: self.state.clone(),
        }
    }

    async fn ping(&self) -> DocumentStoreResult<()> {
        self.state.ensure_open()?;
        self.state.pings.fetch_add(1, Ordering::AcqRel);

        if self.state.unreachable {
            return Err(DocumentStoreError::backend(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "server selection failed: no primary is reachable",
            )));
        }

        Ok(())
    }

    async fn disconnect(self) -> DocumentStoreResult<()> {
        debug!(database = %self.name, "closing in-memory client");
        self.state.closed.store(true, Ordering::Release);

        Ok(())
    }
}

/// Builder for [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct InMemoryDatabaseBuilder {
    name: String,
    unreachable: bool,
}

impl InMemoryDatabaseBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unreachable: false,
        }
    }

    /// Makes every health check fail, as if no primary were reachable.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }
}

#[async_trait]
impl DatabaseBackendBuilder for InMemoryDatabaseBuilder {
    type Backend = InMemoryDatabase;

    fn database_name(&self) -> &str {
        &self.name
    }

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        if self.name.trim().is_empty() {
            return Err(DocumentStoreError::Configuration("database name is required".into()));
        }

        Ok(InMemoryDatabase {
            name: self.name,
            store: Arc::new(RwLock::new(StoreMap::new())),
            state: Arc::new(ClientState {
                unreachable: self.unreachable,
                ..ClientState::default()
            }),
        })
    }
}

/// One collection of an [`InMemoryDatabase`].
#[derive(Debug, Clone)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
    state: Arc<ClientState>,
}

impl InMemoryCollection {
    async fn read<R, F>(&self, op: F) -> DocumentStoreResult<R>
    where
        F: FnOnce(&[Document]) -> DocumentStoreResult<R> + Send,
        R: Send,
    {
        self.state.ensure_open()?;
        let store = self.store.read().await;

        op(store.get(&self.name).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Runs `op` under the write lock. A collection is only materialized once it holds a
    /// document.
    async fn write<R, F>(&self, op: F) -> DocumentStoreResult<R>
    where
        F: FnOnce(&mut CollectionData) -> DocumentStoreResult<R> + Send,
        R: Send,
    {
        self.state.ensure_open()?;
        let mut store = self.store.write().await;

        let existed = store.contains_key(&self.name);
        let data = store.entry(self.name.clone()).or_default();
        let result = op(data);
        if !existed && data.is_empty() {
            store.remove(&self.name);
        }

        result
    }

    fn insert(&self, data: &mut CollectionData, document: Document) -> DocumentStoreResult<Bson> {
        let (id, document) = match document.get("_id").cloned() {
            Some(id) => (id, document),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let document = Document::from_iter(
                    iter::once(("_id".to_string(), id.clone())).chain(document),
                );
                (id, document)
            }
        };

        if data.iter().any(|existing| has_id(existing, &id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), self.name.clone()));
        }

        data.push(document);
        Ok(id)
    }

    fn update(
        &self,
        data: &mut CollectionData,
        filter: &Document,
        modifications: &UpdateModifications,
        upsert: bool,
        multi: bool,
    ) -> DocumentStoreResult<UpdateResult> {
        update::validate(modifications)?;

        let mut targets = matching(data, filter)?;
        if !multi {
            targets.truncate(1);
        }

        if targets.is_empty() && upsert {
            let id = self.upsert(data, filter, modifications)?;
            return Ok(UpdateResult {
                matched_count: 0,
                modified_count: 0,
                upserted_id: Some(id),
            });
        }

        let mut modified_count = 0;
        for index in &targets {
            let mut next = data[*index].clone();
            update::apply(&mut next, modifications, false)?;
            if next != data[*index] {
                data[*index] = next;
                modified_count += 1;
            }
        }

        Ok(UpdateResult {
            matched_count: targets.len() as u64,
            modified_count,
            upserted_id: None,
        })
    }

    fn upsert(
        &self,
        data: &mut CollectionData,
        filter: &Document,
        modifications: &UpdateModifications,
    ) -> DocumentStoreResult<Bson> {
        let mut seed = update::seed_from_filter(filter)?;
        update::apply(&mut seed, modifications, true)?;

        self.insert(data, seed)
    }

    fn replace(
        &self,
        data: &mut CollectionData,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> DocumentStoreResult<UpdateResult> {
        if let Some(key) = replacement.keys().find(|k| k.starts_with('$')) {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "replacement document must not contain operators, found '{key}'"
            )));
        }

        let Some(index) = matching(data, filter)?.into_iter().next() else {
            if !upsert {
                return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: None });
            }
            let mut replacement = replacement;
            if !replacement.contains_key("_id") {
                if let Some(id) = update::seed_from_filter(filter)?.get("_id") {
                    replacement.insert("_id", id.clone());
                }
            }
            let id = self.insert(data, replacement)?;
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: Some(id) });
        };

        let current_id = data[index].get("_id").cloned().unwrap_or(Bson::Null);
        if let Some(id) = replacement.get("_id") {
            if !values_equal(id, &current_id) {
                return Err(DocumentStoreError::InvalidDocument(
                    "the _id field cannot be changed by a replacement".into(),
                ));
            }
        }

        let next = Document::from_iter(
            iter::once(("_id".to_string(), current_id))
                .chain(replacement.into_iter().filter(|(key, _)| key != "_id")),
        );
        let modified = next != data[index];
        data[index] = next;

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: modified as u64,
            upserted_id: None,
        })
    }

    fn apply_model(
        &self,
        data: &mut CollectionData,
        model: WriteModel,
        result: &mut BulkWriteResult,
    ) -> DocumentStoreResult<()> {
        match model {
            WriteModel::InsertOne { document } => {
                self.insert(data, document)?;
                result.inserted_count += 1;
            }
            WriteModel::UpdateOne { filter, update, upsert } => {
                record(result, self.update(data, &filter, &update, upsert.unwrap_or(false), false)?);
            }
            WriteModel::UpdateMany { filter, update, upsert } => {
                record(result, self.update(data, &filter, &update, upsert.unwrap_or(false), true)?);
            }
            WriteModel::ReplaceOne { filter, replacement, upsert } => {
                record(result, self.replace(data, &filter, replacement, upsert.unwrap_or(false))?);
            }
            WriteModel::DeleteOne { filter } => {
                result.deleted_count += delete(data, &filter, false)?;
            }
            WriteModel::DeleteMany { filter } => {
                result.deleted_count += delete(data, &filter, true)?;
            }
        }

        Ok(())
    }
}

fn record(result: &mut BulkWriteResult, outcome: UpdateResult) {
    result.matched_count += outcome.matched_count;
    result.modified_count += outcome.modified_count;
    result.upserted_count += outcome.upserted_id.is_some() as u64;
}

fn reject_array_filters(array_filters: Option<&Vec<Document>>) -> DocumentStoreResult<()> {
    match array_filters {
        Some(_) => Err(DocumentStoreError::UnsupportedOperator("arrayFilters".into())),
        None => Ok(()),
    }
}

fn has_id(document: &Document, id: &Bson) -> bool {
    document.get("_id").is_some_and(|existing| values_equal(existing, id))
}

fn matching(data: &[Document], filter: &Document) -> DocumentStoreResult<Vec<usize>> {
    let mut indices = Vec::new();
    for (index, document) in data.iter().enumerate() {
        if matches(document, filter)? {
            indices.push(index);
        }
    }
    Ok(indices)
}

/// Index of the first match, honouring an optional sort.
fn first_match(data: &[Document], filter: &Document, sort: Option<&Document>) -> DocumentStoreResult<Option<usize>> {
    let mut indices = matching(data, filter)?;
    if let Some(sort) = sort {
        sort_indices(data, &mut indices, sort)?;
    }
    Ok(indices.first().copied())
}

fn select(
    data: &[Document],
    filter: &Document,
    sort: Option<&Document>,
    skip: u64,
    limit: Option<usize>,
    projection: Option<&Document>,
) -> DocumentStoreResult<Vec<Document>> {
    let mut indices = matching(data, filter)?;
    if let Some(sort) = sort {
        sort_indices(data, &mut indices, sort)?;
    }

    indices
        .into_iter()
        .skip(skip as usize)
        .take(limit.unwrap_or(usize::MAX))
        .map(|index| shaped(&data[index], projection))
        .collect()
}

fn shaped(document: &Document, projection: Option<&Document>) -> DocumentStoreResult<Document> {
    match projection {
        Some(projection) => project(document, projection),
        None => Ok(document.clone()),
    }
}

fn delete(data: &mut CollectionData, filter: &Document, multi: bool) -> DocumentStoreResult<u64> {
    let mut targets = matching(data, filter)?;
    if !multi {
        targets.truncate(1);
    }

    for index in targets.iter().rev() {
        data.remove(*index);
    }

    Ok(targets.len() as u64)
}

#[async_trait]
impl CollectionBackend for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn drop(&self) -> DocumentStoreResult<()> {
        self.state.ensure_open()?;
        debug!(collection = %self.name, "dropping in-memory collection");
        self.store.write().await.remove(&self.name);

        Ok(())
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        _options: AggregateOptions,
    ) -> DocumentStoreResult<Cursor> {
        let documents = self.read(|data| pipeline::run(data.to_vec(), &pipeline)).await?;

        Ok(Cursor::from_documents(documents))
    }

    async fn find(&self, filter: Document, options: FindOptions) -> DocumentStoreResult<Cursor> {
        // a negative limit returns a single batch of that size; there is no batching here
        let limit = options
            .limit
            .filter(|limit| *limit != 0)
            .map(|limit| limit.unsigned_abs() as usize);

        let documents = self
            .read(|data| {
                select(
                    data,
                    &filter,
                    options.sort.as_ref(),
                    options.skip.unwrap_or(0),
                    limit,
                    options.projection.as_ref(),
                )
            })
            .await?;

        Ok(Cursor::from_documents(documents))
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.read(|data| {
            select(
                data,
                &filter,
                options.sort.as_ref(),
                options.skip.unwrap_or(0),
                Some(1),
                options.projection.as_ref(),
            )
            .map(|documents| documents.into_iter().next())
        })
        .await
    }

    async fn bulk_write(
        &self,
        models: Vec<WriteModel>,
        options: BulkWriteOptions,
    ) -> DocumentStoreResult<BulkWriteResult> {
        let ordered = options.ordered.unwrap_or(true);
        debug!(collection = %self.name, models = models.len(), ordered, "applying bulk write");

        self.write(|data| {
            let mut result = BulkWriteResult::default();
            let mut first_error = None;

            for model in models {
                if let Err(err) = self.apply_model(data, model, &mut result) {
                    if ordered {
                        return Err(err);
                    }
                    first_error.get_or_insert(err);
                }
            }

            match first_error {
                Some(err) => Err(err),
                None => Ok(result),
            }
        })
        .await
    }

    async fn count_documents(
        &self,
        filter: Document,
        options: CountOptions,
    ) -> DocumentStoreResult<u64> {
        self.read(|data| {
            let matched = matching(data, &filter)?.len() as u64;
            let remaining = matched.saturating_sub(options.skip.unwrap_or(0));

            Ok(match options.limit {
                Some(limit) if limit > 0 => remaining.min(limit),
                _ => remaining,
            })
        })
        .await
    }

    async fn delete_one(
        &self,
        filter: Document,
        _options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        self.write(|data| delete(data, &filter, false))
            .await
            .map(|deleted_count| DeleteResult { deleted_count })
    }

    async fn delete_many(
        &self,
        filter: Document,
        _options: DeleteOptions,
    ) -> DocumentStoreResult<DeleteResult> {
        self.write(|data| delete(data, &filter, true))
            .await
            .map(|deleted_count| DeleteResult { deleted_count })
    }

    async fn update_many(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        reject_array_filters(options.array_filters.as_ref())?;
        let upsert = options.upsert.unwrap_or(false);

        self.write(|data| self.update(data, &filter, &update, upsert, true)).await
    }

    async fn update_one(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: UpdateOptions,
    ) -> DocumentStoreResult<UpdateResult> {
        reject_array_filters(options.array_filters.as_ref())?;
        let upsert = options.upsert.unwrap_or(false);

        self.write(|data| self.update(data, &filter, &update, upsert, false)).await
    }

    async fn insert_many(
        &self,
        documents: Vec<Document>,
        options: InsertManyOptions,
    ) -> DocumentStoreResult<InsertManyResult> {
        let ordered = options.ordered.unwrap_or(true);

        self.write(|data| {
            let mut inserted_ids = HashMap::with_capacity(documents.len());
            let mut first_error = None;

            for (index, document) in documents.into_iter().enumerate() {
                match self.insert(data, document) {
                    Ok(id) => {
                        inserted_ids.insert(index, id);
                    }
                    Err(err) if ordered => return Err(err),
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }

            match first_error {
                Some(err) => Err(err),
                None => Ok(InsertManyResult { inserted_ids }),
            }
        })
        .await
    }

    async fn insert_one(
        &self,
        document: Document,
        _options: InsertOneOptions,
    ) -> DocumentStoreResult<InsertOneResult> {
        self.write(|data| self.insert(data, document))
            .await
            .map(|inserted_id| InsertOneResult { inserted_id })
    }

    async fn find_one_and_update(
        &self,
        filter: Document,
        update: UpdateModifications,
        options: FindOneAndUpdateOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        reject_array_filters(options.array_filters.as_ref())?;
        let return_after = matches!(options.return_document, Some(ReturnDocument::After));
        let projection = options.projection.as_ref();

        self.write(|data| {
            update::validate(&update)?;

            match first_match(data, &filter, options.sort.as_ref())? {
                Some(index) => {
                    let mut next = data[index].clone();
                    update::apply(&mut next, &update, false)?;
                    let before = std::mem::replace(&mut data[index], next);

                    let returned = if return_after { &data[index] } else { &before };
                    shaped(returned, projection).map(Some)
                }
                None if options.upsert.unwrap_or(false) => {
                    let id = self.upsert(data, &filter, &update)?;
                    if !return_after {
                        return Ok(None);
                    }
                    data.iter()
                        .find(|document| has_id(document, &id))
                        .map(|document| shaped(document, projection))
                        .transpose()
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_one_and_delete(
        &self,
        filter: Document,
        options: FindOneAndDeleteOptions,
    ) -> DocumentStoreResult<Option<Document>> {
        self.write(|data| match first_match(data, &filter, options.sort.as_ref())? {
            Some(index) => {
                let removed = data.remove(index);
                shaped(&removed, options.projection.as_ref()).map(Some)
            }
            None => Ok(None),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    async fn collection(name: &str) -> (InMemoryDatabase, InMemoryCollection) {
        let database = InMemoryDatabase::builder("app").build().await.unwrap();
        let collection = database.collection(name, CollectionOptions::default());
        (database, collection)
    }

    async fn seed(collection: &InMemoryCollection) {
        collection
            .insert_many(
                vec![
                    doc! { "_id": 1, "name": "ann", "age": 31, "team": "red" },
                    doc! { "_id": 2, "name": "bob", "age": 25, "team": "blue" },
                    doc! { "_id": 3, "name": "cat", "age": 42, "team": "red" },
                ],
                InsertManyOptions::default(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_build_rejects_empty_name() {
        let result = InMemoryDatabase::builder(" ").build().await;

        assert!(matches!(result, Err(DocumentStoreError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_ping_counts_and_unreachable() {
        let database = InMemoryDatabase::builder("app").build().await.unwrap();
        database.ping().await.unwrap();
        assert_eq!(database.ping_count(), 1);

        let down = InMemoryDatabase::builder("app").unreachable().build().await.unwrap();
        let err = down.ping().await.unwrap_err();
        assert_eq!(
            err.backend_source::<io::Error>().map(io::Error::kind),
            Some(io::ErrorKind::ConnectionRefused)
        );
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id_first() {
        let (_db, users) = collection("users").await;

        let result = users.insert_one(doc! { "name": "ann" }, InsertOneOptions::default()).await.unwrap();

        assert!(matches!(result.inserted_id, Bson::ObjectId(_)));
        let stored = users.find_one(doc! {}, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(stored.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(stored.get("_id"), Some(&result.inserted_id));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let (_db, users) = collection("users").await;
        users.insert_one(doc! { "_id": 1 }, InsertOneOptions::default()).await.unwrap();

        let err = users.insert_one(doc! { "_id": 1 }, InsertOneOptions::default()).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(_, c) if c == "users"));
    }

    #[tokio::test]
    async fn test_unordered_insert_many_continues_past_errors() {
        let (_db, users) = collection("users").await;
        users.insert_one(doc! { "_id": 2 }, InsertOneOptions::default()).await.unwrap();

        let options = InsertManyOptions { ordered: Some(false), ..Default::default() };
        let result = users
            .insert_many(vec![doc! { "_id": 1 }, doc! { "_id": 2 }, doc! { "_id": 3 }], options)
            .await;

        assert!(result.is_err());
        assert_eq!(users.count_documents(doc! {}, CountOptions::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ordered_insert_many_stops_at_first_error() {
        let (_db, users) = collection("users").await;
        users.insert_one(doc! { "_id": 2 }, InsertOneOptions::default()).await.unwrap();

        let result = users
            .insert_many(vec![doc! { "_id": 1 }, doc! { "_id": 2 }, doc! { "_id": 3 }], InsertManyOptions::default())
            .await;

        assert!(result.is_err());
        assert_eq!(users.count_documents(doc! {}, CountOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_options() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let options = FindOptions::default()
            .with_sort(doc! { "age": -1 })
            .with_skip(1)
            .with_limit(1)
            .with_projection(doc! { "name": 1, "_id": 0 });
        let found: Vec<Document> = users
            .find(doc! { "team": "red" }, options)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "name": "ann" }]);

        let all = users.find(doc! {}, FindOptions::default()).await.unwrap().collect_documents().await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_count_with_skip_and_limit() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let options = CountOptions { skip: Some(1), limit: Some(5), ..Default::default() };

        assert_eq!(users.count_documents(doc! {}, options).await.unwrap(), 2);
        assert_eq!(users.count_documents(doc! { "team": "red" }, CountOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_counts_and_upsert() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let result = users
            .update_many(doc! { "team": "red" }, doc! { "$set": { "team": "red" } }.into(), UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((result.matched_count, result.modified_count), (2, 0));

        let result = users
            .update_one(doc! { "team": "red" }, doc! { "$inc": { "age": 1 } }.into(), UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((result.matched_count, result.modified_count), (1, 1));

        let result = users
            .update_one(doc! { "name": "dan" }, doc! { "$set": { "age": 19 } }.into(), UpdateOptions::upsert())
            .await
            .unwrap();
        assert_eq!(result.matched_count, 0);
        let id = result.upserted_id.unwrap();
        let dan = users.find_one(doc! { "_id": id }, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(dan.get_str("name").unwrap(), "dan");
        assert_eq!(dan.get_i32("age").unwrap(), 19);
    }

    #[tokio::test]
    async fn test_update_rejects_replacement_document() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let err = users
            .update_one(doc! { "_id": 1 }, doc! { "name": "zed" }.into(), UpdateOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_pipeline_update() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        users
            .update_one(
                doc! { "_id": 2 },
                vec![doc! { "$set": { "label": "$name" } }, doc! { "$unset": "team" }].into(),
                UpdateOptions::default(),
            )
            .await
            .unwrap();

        let bob = users.find_one(doc! { "_id": 2 }, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(bob, doc! { "_id": 2, "name": "bob", "age": 25, "label": "bob" });
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let one = users.delete_one(doc! { "team": "red" }, DeleteOptions::default()).await.unwrap();
        let many = users.delete_many(doc! {}, DeleteOptions::default()).await.unwrap();

        assert_eq!((one.deleted_count, many.deleted_count), (1, 2));
    }

    #[tokio::test]
    async fn test_find_one_and_update_returns_requested_version() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let before = users
            .find_one_and_update(doc! { "_id": 1 }, doc! { "$set": { "age": 32 } }.into(), FindOneAndUpdateOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.get_i32("age").unwrap(), 31);

        let options = FindOneAndUpdateOptions {
            return_document: Some(ReturnDocument::After),
            projection: Some(doc! { "age": 1 }),
            ..Default::default()
        };
        let after = users
            .find_one_and_update(doc! { "_id": 1 }, doc! { "$inc": { "age": 1 } }.into(), options)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after, doc! { "_id": 1, "age": 33 });
    }

    #[tokio::test]
    async fn test_find_one_and_update_upsert() {
        let (_db, users) = collection("users").await;

        let options = FindOneAndUpdateOptions {
            upsert: Some(true),
            return_document: Some(ReturnDocument::After),
            ..Default::default()
        };
        let created = users
            .find_one_and_update(doc! { "_id": 9 }, doc! { "$set": { "name": "ivy" } }.into(), options)
            .await
            .unwrap();

        assert_eq!(created, Some(doc! { "_id": 9, "name": "ivy" }));
    }

    #[tokio::test]
    async fn test_find_one_and_delete_honours_sort() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let options = FindOneAndDeleteOptions { sort: Some(doc! { "age": -1 }), ..Default::default() };
        let removed = users.find_one_and_delete(doc! { "team": "red" }, options).await.unwrap().unwrap();

        assert_eq!(removed.get_str("name").unwrap(), "cat");
        assert_eq!(users.count_documents(doc! {}, CountOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bulk_write_counts() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let result = users
            .bulk_write(
                vec![
                    WriteModel::insert_one(doc! { "_id": 4, "name": "dan" }),
                    WriteModel::update_many(doc! { "team": "red" }, doc! { "$set": { "active": true } }),
                    WriteModel::update_one(doc! { "_id": 5 }, doc! { "$set": { "name": "eve" } }).with_upsert(true),
                    WriteModel::replace_one(doc! { "_id": 2 }, doc! { "name": "robert" }),
                    WriteModel::delete_one(doc! { "_id": 4 }),
                ],
                BulkWriteOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            result,
            BulkWriteResult {
                inserted_count: 1,
                matched_count: 3,
                modified_count: 3,
                deleted_count: 1,
                upserted_count: 1,
            }
        );
        let bob = users.find_one(doc! { "_id": 2 }, FindOneOptions::default()).await.unwrap().unwrap();
        assert_eq!(bob, doc! { "_id": 2, "name": "robert" });
    }

    #[tokio::test]
    async fn test_ordered_bulk_write_stops_at_first_error() {
        let (_db, users) = collection("users").await;
        seed(&users).await;

        let result = users
            .bulk_write(
                vec![
                    WriteModel::insert_one(doc! { "_id": 1 }),
                    WriteModel::insert_one(doc! { "_id": 10 }),
                ],
                BulkWriteOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(DocumentStoreError::DocumentAlreadyExists(_, _))));
        assert_eq!(users.count_documents(doc! {}, CountOptions::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_aggregate_and_drop() {
        let (db, users) = collection("users").await;
        seed(&users).await;

        let grouped = users
            .aggregate(
                vec![
                    doc! { "$group": { "_id": "$team", "n": { "$sum": 1 } } },
                    doc! { "$sort": { "_id": 1 } },
                ],
                AggregateOptions::default(),
            )
            .await
            .unwrap()
            .collect_documents()
            .await
            .unwrap();
        assert_eq!(grouped, vec![doc! { "_id": "blue", "n": 1 }, doc! { "_id": "red", "n": 2 }]);

        assert_eq!(db.collection_names().await, vec!["users".to_string()]);
        users.drop().await.unwrap();
        assert!(db.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_do_not_create_collections() {
        let (db, users) = collection("ghost").await;

        users.delete_many(doc! {}, DeleteOptions::default()).await.unwrap();
        users.update_one(doc! {}, doc! { "$set": { "a": 1 } }.into(), UpdateOptions::default()).await.unwrap();

        assert!(db.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_operations_fail_after_disconnect() {
        let (db, users) = collection("users").await;

        db.clone().disconnect().await.unwrap();

        assert!(db.is_closed());
        assert!(matches!(
            users.insert_one(doc! {}, InsertOneOptions::default()).await,
            Err(DocumentStoreError::ClientClosed)
        ));
        assert!(matches!(db.ping().await, Err(DocumentStoreError::ClientClosed)));
    }

    #[tokio::test]
    async fn test_array_filters_are_rejected() {
        let (_db, users) = collection("users").await;
        users.insert_one(doc! { "_id": 1, "grades": [80, 95] }, InsertOneOptions::default()).await.unwrap();
        let array_filters = Some(vec![doc! { "g": { "$gte": 90 } }]);
        let update = || UpdateModifications::from(doc! { "$set": { "grades.$[g]": 100 } });

        let update_options = UpdateOptions { array_filters: array_filters.clone(), ..UpdateOptions::default() };
        assert!(matches!(
            users.update_one(doc! {}, update(), update_options.clone()).await,
            Err(DocumentStoreError::UnsupportedOperator(op)) if op == "arrayFilters"
        ));
        assert!(matches!(
            users.update_many(doc! {}, update(), update_options).await,
            Err(DocumentStoreError::UnsupportedOperator(op)) if op == "arrayFilters"
        ));
        assert!(matches!(
            users
                .find_one_and_update(
                    doc! {},
                    update(),
                    FindOneAndUpdateOptions { array_filters, ..FindOneAndUpdateOptions::default() },
                )
                .await,
            Err(DocumentStoreError::UnsupportedOperator(op)) if op == "arrayFilters"
        ));

        let stored = users.find_one(doc! {}, FindOneOptions::default()).await.unwrap();
        assert_eq!(stored, Some(doc! { "_id": 1, "grades": [80, 95] }));
    }

    #[tokio::test]
    async fn test_emptied_collection_stays_listed() {
        let (db, users) = collection("users").await;
        users.insert_one(doc! { "a": 1 }, InsertOneOptions::default()).await.unwrap();

        users.delete_many(doc! {}, DeleteOptions::default()).await.unwrap();

        assert_eq!(db.collection_names().await, vec!["users".to_string()]);
    }
}
