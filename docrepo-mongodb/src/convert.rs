//! Conversion of docrepo option sets, write models and results into their driver
//! counterparts.
//!
//! Every field is copied one to one. Fields left unset stay unset so the driver applies its
//! own defaults.

use mongodb::{
    Namespace,
    options::{
        self as driver, Acknowledgment, DeleteManyModel, DeleteOneModel, InsertOneModel,
        ReplaceOneModel, SelectionCriteria, UpdateManyModel, UpdateOneModel,
    },
    results as driver_results,
};

use docrepo_core::{
    model::{UpdateModifications, WriteModel},
    options::{
        AggregateOptions, CollectionOptions, CountOptions, DeleteOptions, FindOneAndDeleteOptions,
        FindOneAndUpdateOptions, FindOneOptions, FindOptions, InsertManyOptions,
        InsertOneOptions, ReadPreference, ReturnDocument, UpdateOptions, WriteConcern,
    },
    results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult},
};

/// Converts a docrepo value into the driver's equivalent.
pub(crate) trait IntoDriver {
    type Output;

    fn into_driver(self) -> Self::Output;
}

/// Converts a driver result into the docrepo equivalent.
pub(crate) trait FromDriver<T> {
    fn from_driver(value: T) -> Self;
}

impl IntoDriver for WriteConcern {
    type Output = driver::WriteConcern;

    fn into_driver(self) -> Self::Output {
        let mut write_concern = driver::WriteConcern::default();
        write_concern.w = Some(match self {
            WriteConcern::Nodes(n) => Acknowledgment::Nodes(n),
            WriteConcern::Majority => Acknowledgment::Majority,
            WriteConcern::Custom(tag) => Acknowledgment::Custom(tag),
        });
        write_concern
    }
}

impl IntoDriver for ReadPreference {
    type Output = SelectionCriteria;

    fn into_driver(self) -> Self::Output {
        SelectionCriteria::ReadPreference(match self {
            ReadPreference::Primary => driver::ReadPreference::Primary,
            ReadPreference::PrimaryPreferred => driver::ReadPreference::PrimaryPreferred {
                options: Default::default(),
            },
            ReadPreference::Secondary => driver::ReadPreference::Secondary {
                options: Default::default(),
            },
            ReadPreference::SecondaryPreferred => driver::ReadPreference::SecondaryPreferred {
                options: Default::default(),
            },
            ReadPreference::Nearest => driver::ReadPreference::Nearest {
                options: Default::default(),
            },
        })
    }
}

impl IntoDriver for ReturnDocument {
    type Output = driver::ReturnDocument;

    fn into_driver(self) -> Self::Output {
        match self {
            ReturnDocument::Before => driver::ReturnDocument::Before,
            ReturnDocument::After => driver::ReturnDocument::After,
        }
    }
}

impl IntoDriver for UpdateModifications {
    type Output = driver::UpdateModifications;

    fn into_driver(self) -> Self::Output {
        match self {
            UpdateModifications::Document(document) => driver::UpdateModifications::Document(document),
            UpdateModifications::Pipeline(pipeline) => driver::UpdateModifications::Pipeline(pipeline),
        }
    }
}

impl IntoDriver for CollectionOptions {
    type Output = driver::CollectionOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::CollectionOptions::default();
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options.selection_criteria = self.read_preference.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for FindOptions {
    type Output = driver::FindOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::FindOptions::default();
        options.projection = self.projection;
        options.sort = self.sort;
        options.skip = self.skip;
        options.limit = self.limit;
        options.batch_size = self.batch_size;
        options.max_time = self.max_time;
        options
    }
}

impl IntoDriver for FindOneOptions {
    type Output = driver::FindOneOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::FindOneOptions::default();
        options.projection = self.projection;
        options.sort = self.sort;
        options.skip = self.skip;
        options.max_time = self.max_time;
        options
    }
}

impl IntoDriver for AggregateOptions {
    type Output = driver::AggregateOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::AggregateOptions::default();
        options.allow_disk_use = self.allow_disk_use;
        options.batch_size = self.batch_size;
        options.bypass_document_validation = self.bypass_document_validation;
        options.max_time = self.max_time;
        options
    }
}

impl IntoDriver for CountOptions {
    type Output = driver::CountOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::CountOptions::default();
        options.skip = self.skip;
        options.limit = self.limit;
        options.max_time = self.max_time;
        options
    }
}

impl IntoDriver for DeleteOptions {
    type Output = driver::DeleteOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::DeleteOptions::default();
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for UpdateOptions {
    type Output = driver::UpdateOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::UpdateOptions::default();
        options.upsert = self.upsert;
        options.array_filters = self.array_filters;
        options.bypass_document_validation = self.bypass_document_validation;
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for InsertOneOptions {
    type Output = driver::InsertOneOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::InsertOneOptions::default();
        options.bypass_document_validation = self.bypass_document_validation;
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for InsertManyOptions {
    type Output = driver::InsertManyOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::InsertManyOptions::default();
        options.ordered = self.ordered;
        options.bypass_document_validation = self.bypass_document_validation;
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for FindOneAndUpdateOptions {
    type Output = driver::FindOneAndUpdateOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::FindOneAndUpdateOptions::default();
        options.projection = self.projection;
        options.sort = self.sort;
        options.upsert = self.upsert;
        options.return_document = self.return_document.map(IntoDriver::into_driver);
        options.array_filters = self.array_filters;
        options.max_time = self.max_time;
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

impl IntoDriver for FindOneAndDeleteOptions {
    type Output = driver::FindOneAndDeleteOptions;

    fn into_driver(self) -> Self::Output {
        let mut options = driver::FindOneAndDeleteOptions::default();
        options.projection = self.projection;
        options.sort = self.sort;
        options.max_time = self.max_time;
        options.write_concern = self.write_concern.map(IntoDriver::into_driver);
        options
    }
}

/// Binds a write model to the collection's namespace. The driver's bulk write is issued at
/// client level, so every model carries its target.
pub(crate) fn write_model(namespace: &Namespace, model: WriteModel) -> driver::WriteModel {
    match model {
        WriteModel::InsertOne { document } => driver::WriteModel::InsertOne(
            InsertOneModel::builder()
                .namespace(namespace.clone())
                .document(document)
                .build(),
        ),
        WriteModel::UpdateOne { filter, update, upsert } => {
            let mut model = UpdateOneModel::builder()
                .namespace(namespace.clone())
                .filter(filter)
                .update(update.into_driver())
                .build();
            model.upsert = upsert;
            driver::WriteModel::UpdateOne(model)
        }
        WriteModel::UpdateMany { filter, update, upsert } => {
            let mut model = UpdateManyModel::builder()
                .namespace(namespace.clone())
                .filter(filter)
                .update(update.into_driver())
                .build();
            model.upsert = upsert;
            driver::WriteModel::UpdateMany(model)
        }
        WriteModel::ReplaceOne { filter, replacement, upsert } => {
            let mut model = ReplaceOneModel::builder()
                .namespace(namespace.clone())
                .filter(filter)
                .replacement(replacement)
                .build();
            model.upsert = upsert;
            driver::WriteModel::ReplaceOne(model)
        }
        WriteModel::DeleteOne { filter } => driver::WriteModel::DeleteOne(
            DeleteOneModel::builder()
                .namespace(namespace.clone())
                .filter(filter)
                .build(),
        ),
        WriteModel::DeleteMany { filter } => driver::WriteModel::DeleteMany(
            DeleteManyModel::builder()
                .namespace(namespace.clone())
                .filter(filter)
                .build(),
        ),
    }
}

impl FromDriver<driver_results::InsertOneResult> for InsertOneResult {
    fn from_driver(value: driver_results::InsertOneResult) -> Self {
        InsertOneResult {
            inserted_id: value.inserted_id,
        }
    }
}

impl FromDriver<driver_results::InsertManyResult> for InsertManyResult {
    fn from_driver(value: driver_results::InsertManyResult) -> Self {
        InsertManyResult {
            inserted_ids: value.inserted_ids,
        }
    }
}

impl FromDriver<driver_results::UpdateResult> for UpdateResult {
    fn from_driver(value: driver_results::UpdateResult) -> Self {
        UpdateResult {
            matched_count: value.matched_count,
            modified_count: value.modified_count,
            upserted_id: value.upserted_id,
        }
    }
}

impl FromDriver<driver_results::DeleteResult> for DeleteResult {
    fn from_driver(value: driver_results::DeleteResult) -> Self {
        DeleteResult {
            deleted_count: value.deleted_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::time::Duration;

    #[test]
    fn test_find_options_are_copied_verbatim() {
        let options = FindOptions {
            projection: Some(doc! { "name": 1 }),
            sort: Some(doc! { "age": -1 }),
            skip: Some(5),
            limit: Some(10),
            batch_size: Some(100),
            max_time: Some(Duration::from_millis(250)),
        }
        .into_driver();

        assert_eq!(options.projection, Some(doc! { "name": 1 }));
        assert_eq!(options.sort, Some(doc! { "age": -1 }));
        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.batch_size, Some(100));
        assert_eq!(options.max_time, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unset_options_stay_unset() {
        let options = UpdateOptions::default().into_driver();

        assert!(options.upsert.is_none());
        assert!(options.write_concern.is_none());
        assert!(options.array_filters.is_none());
    }

    #[test]
    fn test_write_concern_mapping() {
        let majority = WriteConcern::Majority.into_driver();
        let nodes = WriteConcern::Nodes(2).into_driver();

        assert_eq!(majority.w, Some(Acknowledgment::Majority));
        assert_eq!(nodes.w, Some(Acknowledgment::Nodes(2)));
    }

    #[test]
    fn test_find_one_and_update_return_document() {
        let options = FindOneAndUpdateOptions {
            return_document: Some(ReturnDocument::After),
            upsert: Some(true),
            ..Default::default()
        }
        .into_driver();

        assert!(matches!(options.return_document, Some(driver::ReturnDocument::After)));
        assert_eq!(options.upsert, Some(true));
    }

    #[test]
    fn test_write_model_carries_namespace_and_upsert() {
        let namespace = Namespace::new("app", "orders");
        let model = write_model(
            &namespace,
            WriteModel::update_one(doc! { "sku": "A-1" }, doc! { "$inc": { "qty": 1 } }).with_upsert(true),
        );

        match model {
            driver::WriteModel::UpdateOne(update) => {
                assert_eq!(update.namespace, namespace);
                assert_eq!(update.filter, doc! { "sku": "A-1" });
                assert_eq!(update.upsert, Some(true));
            }
            other => panic!("unexpected model: {other:?}"),
        }
    }

    #[test]
    fn test_collection_options_read_preference() {
        let options = CollectionOptions {
            read_preference: Some(ReadPreference::Primary),
            write_concern: None,
        }
        .into_driver();

        assert!(matches!(
            options.selection_criteria,
            Some(SelectionCriteria::ReadPreference(driver::ReadPreference::Primary))
        ));
        assert!(options.write_concern.is_none());
    }
}
