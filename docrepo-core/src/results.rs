//! Results returned by write operations.

use std::collections::HashMap;

use bson::Bson;

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    /// The `_id` of the inserted document.
    pub inserted_id: Bson,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    /// The `_id` of every inserted document, keyed by its position in the input.
    pub inserted_ids: HashMap<usize, Bson>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// The `_id` of the document inserted by an upsert, if any.
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Summary counts for a bulk write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
}
