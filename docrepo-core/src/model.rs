//! Write models submitted through a bulk write, and update specifications.

use bson::Document;

/// An update specification: either an operator document (`{"$set": {...}}`) or an
/// aggregation pipeline of update stages.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateModifications {
    Document(Document),
    Pipeline(Vec<Document>),
}

impl From<Document> for UpdateModifications {
    fn from(document: Document) -> Self {
        UpdateModifications::Document(document)
    }
}

impl From<Vec<Document>> for UpdateModifications {
    fn from(pipeline: Vec<Document>) -> Self {
        UpdateModifications::Pipeline(pipeline)
    }
}

/// A single write inside a bulk write request.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    UpdateOne {
        filter: Document,
        update: UpdateModifications,
        upsert: Option<bool>,
    },
    UpdateMany {
        filter: Document,
        update: UpdateModifications,
        upsert: Option<bool>,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: Option<bool>,
    },
    DeleteOne {
        filter: Document,
    },
    DeleteMany {
        filter: Document,
    },
}

impl WriteModel {
    pub fn insert_one(document: Document) -> Self {
        WriteModel::InsertOne { document }
    }

    pub fn update_one(filter: Document, update: impl Into<UpdateModifications>) -> Self {
        WriteModel::UpdateOne {
            filter,
            update: update.into(),
            upsert: None,
        }
    }

    pub fn update_many(filter: Document, update: impl Into<UpdateModifications>) -> Self {
        WriteModel::UpdateMany {
            filter,
            update: update.into(),
            upsert: None,
        }
    }

    pub fn replace_one(filter: Document, replacement: Document) -> Self {
        WriteModel::ReplaceOne {
            filter,
            replacement,
            upsert: None,
        }
    }

    pub fn delete_one(filter: Document) -> Self {
        WriteModel::DeleteOne { filter }
    }

    pub fn delete_many(filter: Document) -> Self {
        WriteModel::DeleteMany { filter }
    }

    /// Sets the upsert flag on update and replace models. Other models are returned unchanged.
    pub fn with_upsert(self, value: bool) -> Self {
        match self {
            WriteModel::UpdateOne { filter, update, .. } => WriteModel::UpdateOne {
                filter,
                update,
                upsert: Some(value),
            },
            WriteModel::UpdateMany { filter, update, .. } => WriteModel::UpdateMany {
                filter,
                update,
                upsert: Some(value),
            },
            WriteModel::ReplaceOne { filter, replacement, .. } => WriteModel::ReplaceOne {
                filter,
                replacement,
                upsert: Some(value),
            },
            other => other,
        }
    }
}
