//! Error types and result types for repository operations.
//!
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations. Errors raised by a
//! database driver are carried unchanged inside [`DocumentStoreError::Backend`] so callers can
//! downcast them back to the driver's own error type.

use std::{error::Error as StdError, time::Duration};

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A boxed error raised by an underlying driver.
pub type BoxedBackendError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all possible errors that can occur when interacting with a document database.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The connection parameters are unusable. Raised before any network call is attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Error during client construction or the startup health check.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A bounded lifecycle step (connect, disconnect) did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// The lifecycle step that timed out.
        operation: &'static str,
        /// The bound that elapsed.
        timeout: Duration,
    },
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The document, filter, or update specification has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A query, update, or pipeline operator the backend does not understand.
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// The client has been disconnected and can no longer serve operations.
    #[error("Client has been disconnected")]
    ClientClosed,
    /// An error raised by the underlying database driver, passed through verbatim.
    #[error("Backend error: {0}")]
    Backend(#[source] BoxedBackendError),
}

impl DocumentStoreError {
    /// Wraps a driver error without altering it.
    pub fn backend<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        DocumentStoreError::Backend(Box::new(err))
    }

    /// Returns the driver error if this is a [`DocumentStoreError::Backend`] of type `E`.
    pub fn backend_source<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            DocumentStoreError::Backend(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// A specialized `Result` type for repository operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_backend_error_is_downcastable() {
        let err = DocumentStoreError::backend(io::Error::new(io::ErrorKind::TimedOut, "socket"));

        let source = err.backend_source::<io::Error>().unwrap();
        assert_eq!(source.kind(), io::ErrorKind::TimedOut);
        assert!(err.backend_source::<SerdeJsonError>().is_none());
        assert_eq!(err.to_string(), "Backend error: socket");
    }

    #[test]
    fn test_timeout_display() {
        let err = DocumentStoreError::Timeout {
            operation: "connect",
            timeout: Duration::from_secs(10),
        };

        assert_eq!(err.to_string(), "connect timed out after 10s");
    }
}
