//! Option sets accepted by collection operations.
//!
//! Each operation takes its own option struct, mirroring the options the
//! underlying driver defines for that call. Every struct implements `Default`, and collection
//! methods accept `impl Into<Option<_>>` so `None` can be passed when no option is needed.
//!
//! ```ignore
//! use docrepo::options::FindOptions;
//! use bson::doc;
//!
//! let options = FindOptions::default()
//!     .with_sort(doc! { "created_at": -1 })
//!     .with_limit(10);
//! let recent = collection.find(doc! { "status": "active" }, options).await?;
//! ```

use std::time::Duration;

use bson::Document;

/// Acknowledgment requested from the server for write operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteConcern {
    /// Acknowledge writes from the specified number of nodes.
    Nodes(u32),
    /// Acknowledge writes from a majority of nodes.
    Majority,
    /// Custom tag set.
    Custom(String),
}

/// Which replica set members may serve reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPreference {
    /// Read from primary only.
    #[default]
    Primary,
    /// Read from primary preferred, fallback to secondary.
    PrimaryPreferred,
    /// Read from secondary only.
    Secondary,
    /// Read from secondary preferred, fallback to primary.
    SecondaryPreferred,
    /// Read from nearest member.
    Nearest,
}

/// Whether find-and-modify returns the document before or after the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

/// Options applied when acquiring a collection handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionOptions {
    pub write_concern: Option<WriteConcern>,
    pub read_preference: Option<ReadPreference>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub batch_size: Option<u32>,
    /// Server-side time limit for the query.
    pub max_time: Option<Duration>,
}

impl FindOptions {
    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub max_time: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
    pub bypass_document_validation: Option<bool>,
    pub max_time: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub max_time: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    pub write_concern: Option<WriteConcern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches the filter.
    pub upsert: Option<bool>,
    pub array_filters: Option<Vec<Document>>,
    pub bypass_document_validation: Option<bool>,
    pub write_concern: Option<WriteConcern>,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self {
            upsert: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOptions {
    pub bypass_document_validation: Option<bool>,
    pub write_concern: Option<WriteConcern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyOptions {
    /// Stop at the first failed insert (server default: `true`).
    pub ordered: Option<bool>,
    pub bypass_document_validation: Option<bool>,
    pub write_concern: Option<WriteConcern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub upsert: Option<bool>,
    pub return_document: Option<ReturnDocument>,
    pub array_filters: Option<Vec<Document>>,
    pub max_time: Option<Duration>,
    pub write_concern: Option<WriteConcern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndDeleteOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub max_time: Option<Duration>,
    pub write_concern: Option<WriteConcern>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteOptions {
    /// Stop at the first failed write (server default: `true`).
    pub ordered: Option<bool>,
    pub bypass_document_validation: Option<bool>,
}
