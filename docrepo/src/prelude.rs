//! Convenient re-exports of commonly used types from docrepo.
//!
//! ```ignore
//! use docrepo::prelude::*;
//! ```

pub use docrepo_core::{
    backend::{CollectionBackend, DatabaseBackend, DatabaseBackendBuilder},
    collection::{Collection, DynCollection},
    config::ConnectionConfig,
    cursor::Cursor,
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    model::{UpdateModifications, WriteModel},
    options::{
        AggregateOptions, BulkWriteOptions, CollectionOptions, CountOptions, DeleteOptions,
        FindOneAndDeleteOptions, FindOneAndUpdateOptions, FindOneOptions, FindOptions,
        InsertManyOptions, InsertOneOptions, ReadPreference, ReturnDocument, UpdateOptions,
        WriteConcern,
    },
    results::{BulkWriteResult, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
    validation::{StructValidator, Validate, ValidationReport},
};
