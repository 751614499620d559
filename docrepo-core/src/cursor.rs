//! Lazy streams over multi-document reads.

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bson::{Bson, Document, de::deserialize_from_bson};
use futures::{
    Stream, StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use serde::de::DeserializeOwned;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A stream of documents produced by `find` or `aggregate`.
///
/// Backends hand over whatever lazy sequence they have (a driver cursor, an in-memory
/// snapshot) and the cursor yields its documents unchanged.
pub struct Cursor {
    inner: BoxStream<'static, DocumentStoreResult<Document>>,
}

impl Cursor {
    /// Wraps a backend stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DocumentStoreResult<Document>> + Send + 'static,
    {
        Self { inner: stream.boxed() }
    }

    /// A cursor over an already materialized batch.
    pub fn from_documents(documents: Vec<Document>) -> Self {
        Self::new(stream::iter(documents.into_iter().map(Ok)))
    }

    /// Drains the cursor, stopping at the first error.
    pub async fn collect_documents(self) -> DocumentStoreResult<Vec<Document>> {
        self.inner.try_collect().await
    }

    /// Decodes every document into `T` as it is read.
    pub fn deserialize<T>(self) -> impl Stream<Item = DocumentStoreResult<T>> + Send + 'static
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.inner.map(|item| {
            item.and_then(|document| {
                deserialize_from_bson::<T>(Bson::Document(document)).map_err(DocumentStoreError::from)
            })
        })
    }
}

impl Stream for Cursor {
    type Item = DocumentStoreResult<Document>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
        qty: i32,
    }

    #[tokio::test]
    async fn test_collect_preserves_order() {
        let cursor = Cursor::from_documents(vec![doc! { "n": 1 }, doc! { "n": 2 }, doc! { "n": 3 }]);

        let documents = cursor.collect_documents().await.unwrap();
        let values: Vec<i32> = documents.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_stops_at_first_error() {
        let cursor = Cursor::new(stream::iter(vec![
            Ok(doc! { "n": 1 }),
            Err(DocumentStoreError::ClientClosed),
            Ok(doc! { "n": 2 }),
        ]));

        assert!(matches!(
            cursor.collect_documents().await,
            Err(DocumentStoreError::ClientClosed)
        ));
    }

    #[tokio::test]
    async fn test_deserialize_typed_items() {
        let cursor = Cursor::from_documents(vec![doc! { "name": "pen", "qty": 4 }]);

        let items: Vec<Item> = cursor.deserialize().try_collect().await.unwrap();
        assert_eq!(items, vec![Item { name: "pen".into(), qty: 4 }]);
    }
}
