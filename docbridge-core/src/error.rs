//! Error types and result types for document store operations.
//!
//! Every backend reports failures through the same closed taxonomy, [`DocumentStoreError`].
//! Raw driver errors are classified exactly once, where they leave the driver, using
//! [`ClassifyError`] and [`DocumentStoreError::classify`]. Code above that boundary only
//! ever matches on the variants here.

use bson::error::Error as BsonError;
use std::{error::Error as StdError, sync::Arc};
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// The type is `Clone` so that a single failure can be handed out repeatedly (for example
/// by a fault-injected repository). The original cause of an [`Internal`](Self::Internal)
/// error is shared, not copied, and remains reachable through [`StdError::source`].
#[derive(Error, Debug, Clone)]
pub enum DocumentStoreError {
    /// A query or delete matched nothing where a match was required.
    #[error("Not found")]
    NotFound,
    /// The caller supplied an empty or otherwise invalid required argument.
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    /// A create was attempted against an identifier that is already in use.
    #[error("Duplicate: {0}")]
    Duplicate(String),
    /// The store reported a retryable write or transaction conflict.
    ///
    /// Upserts are safe to retry blindly; conditional updates should re-check their
    /// preconditions first.
    #[error("Transaction conflict")]
    TransactionConflict,
    /// Anything else. The original cause is retained for diagnostics.
    #[error("Internal error: {0}")]
    Internal(#[source] Arc<dyn StdError + Send + Sync>),
    /// Sentinel returned by a [`Consumer`](crate::consumer::Consumer) to stop iteration.
    ///
    /// `Collection::find` and `Collection::find_one` treat it as success and never hand it
    /// back to their caller.
    #[error("End of stream")]
    EndOfStream,
}

impl DocumentStoreError {
    /// Wraps an arbitrary error as [`DocumentStoreError::Internal`].
    pub fn internal<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        DocumentStoreError::Internal(Arc::new(err))
    }

    /// Builds an [`Internal`](Self::Internal) error from a plain message.
    pub fn internal_msg(msg: impl Into<String>) -> Self {
        DocumentStoreError::Internal(Arc::new(Message(msg.into())))
    }

    /// Maps a raw driver failure onto the taxonomy.
    ///
    /// Markers are checked in order: not-found, duplicate key, then conflict. Anything
    /// unrecognised becomes [`Internal`](Self::Internal) with the cause preserved.
    pub fn classify<E: ClassifyError>(err: E) -> Self {
        if err.is_not_found() {
            DocumentStoreError::NotFound
        } else if err.is_duplicate() {
            DocumentStoreError::Duplicate(err.to_string())
        } else if err.is_transaction_conflict() {
            DocumentStoreError::TransactionConflict
        } else {
            DocumentStoreError::internal(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::NotFound)
    }

    pub fn is_transaction_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::TransactionConflict)
    }
}

/// Store-specific knowledge needed to classify a raw driver error.
///
/// Drivers implement this for their native error type. Every method defaults to `false`,
/// so an implementation only needs to recognise the markers its store actually emits.
pub trait ClassifyError: StdError + Send + Sync + 'static {
    /// Whether the error means "no document matched".
    fn is_not_found(&self) -> bool {
        false
    }

    /// Whether the error reports a unique key violation, e.g. a second document with an
    /// existing `id`.
    fn is_duplicate(&self) -> bool {
        false
    }

    /// Whether the error carries the store's retryable conflict markers.
    fn is_transaction_conflict(&self) -> bool {
        false
    }
}

/// A plain message used as the cause of an internal error.
#[derive(Error, Debug)]
#[error("{0}")]
struct Message(String);

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("driver: {message}")]
    struct FakeDriverError {
        message: &'static str,
        not_found: bool,
        duplicate: bool,
        conflict: bool,
    }

    impl ClassifyError for FakeDriverError {
        fn is_not_found(&self) -> bool {
            self.not_found
        }

        fn is_duplicate(&self) -> bool {
            self.duplicate
        }

        fn is_transaction_conflict(&self) -> bool {
            self.conflict
        }
    }

    fn fake(not_found: bool, conflict: bool) -> FakeDriverError {
        FakeDriverError { message: "boom", not_found, duplicate: false, conflict }
    }

    #[test]
    fn classifies_conflict_markers() {
        let err = DocumentStoreError::classify(fake(false, true));
        assert!(err.is_transaction_conflict());
    }

    #[test]
    fn classifies_not_found_before_conflict() {
        let err = DocumentStoreError::classify(fake(true, true));
        assert!(err.is_not_found());
    }

    #[test]
    fn classifies_duplicate_keys_before_conflict() {
        let err = DocumentStoreError::classify(FakeDriverError { duplicate: true, ..fake(false, true) });
        assert!(matches!(err, DocumentStoreError::Duplicate(ref message) if message == "driver: boom"));
    }

    #[test]
    fn unrecognised_errors_keep_their_cause() {
        let err = DocumentStoreError::classify(fake(false, false));
        assert!(matches!(err, DocumentStoreError::Internal(_)));
        assert_eq!(err.to_string(), "Internal error: driver: boom");

        let source = err.source().expect("internal errors expose their cause");
        assert_eq!(source.to_string(), "driver: boom");
    }

    #[test]
    fn clones_share_the_cause() {
        let err = DocumentStoreError::internal_msg("disk full");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
