//! Classification of MongoDB driver errors.

use docbridge_core::error::{ClassifyError, DocumentStoreError};
use mongodb::error::{
    Error as MongoError, ErrorKind, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
    WriteFailure,
};
use thiserror::Error;
use tracing::error;

/// Server code reported for write conflicts between concurrent operations.
pub const WRITE_CONFLICT_CODE: i32 = 112;

/// Server code reported for unique index violations (`E11000`).
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// A raw MongoDB driver error, as seen by the classifier.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct MongoDriverError(#[from] pub MongoError);

impl MongoDriverError {
    /// Server error codes carried by the error, including per-write codes of bulk writes.
    fn codes(&self) -> Vec<i32> {
        match self.0.kind.as_ref() {
            ErrorKind::Command(command) => vec![command.code],
            ErrorKind::Write(WriteFailure::WriteError(write)) => vec![write.code],
            ErrorKind::Write(WriteFailure::WriteConcernError(concern)) => vec![concern.code],
            ErrorKind::BulkWrite(bulk) => bulk
                .write_errors
                .values()
                .map(|write| write.code)
                .chain(bulk.write_concern_errors.iter().map(|concern| concern.code))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn has_conflict_markers(has_label: impl Fn(&str) -> bool, codes: &[i32]) -> bool {
    has_label(TRANSIENT_TRANSACTION_ERROR)
        || has_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
        || codes.contains(&WRITE_CONFLICT_CODE)
}

fn has_duplicate_key(codes: &[i32]) -> bool {
    codes.contains(&DUPLICATE_KEY_CODE)
}

impl ClassifyError for MongoDriverError {
    fn is_duplicate(&self) -> bool {
        has_duplicate_key(&self.codes())
    }

    fn is_transaction_conflict(&self) -> bool {
        has_conflict_markers(|label| self.0.contains_label(label), &self.codes())
    }
}

/// Maps a driver failure onto [`DocumentStoreError`], logging it once.
pub(crate) fn classify(err: MongoError) -> DocumentStoreError {
    let classified = DocumentStoreError::classify(MongoDriverError(err));
    error!(error = %classified, "MongoDB operation failed");
    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn unlabelled_errors_are_internal() {
        let err = MongoError::from(std::io::Error::other("connection reset"));
        let wrapped = MongoDriverError(err.clone());

        assert!(!wrapped.is_transaction_conflict());
        assert!(!wrapped.is_duplicate());
        assert!(wrapped.codes().is_empty());

        let classified = classify(err);
        assert!(matches!(classified, DocumentStoreError::Internal(_)));
        assert!(classified.source().is_some());
    }

    #[test]
    fn transaction_labels_mark_conflicts() {
        assert!(has_conflict_markers(|label| label == TRANSIENT_TRANSACTION_ERROR, &[]));
        assert!(has_conflict_markers(|label| label == UNKNOWN_TRANSACTION_COMMIT_RESULT, &[]));
        assert!(!has_conflict_markers(|label| label == "RetryableWriteError", &[]));
    }

    #[test]
    fn write_conflict_code_marks_conflicts() {
        assert!(has_conflict_markers(|_| false, &[WRITE_CONFLICT_CODE]));
        assert!(has_conflict_markers(|_| false, &[2, WRITE_CONFLICT_CODE]));
        assert!(!has_conflict_markers(|_| false, &[DUPLICATE_KEY_CODE]));
    }

    #[test]
    fn duplicate_key_code_marks_duplicates() {
        assert!(has_duplicate_key(&[DUPLICATE_KEY_CODE]));
        assert!(has_duplicate_key(&[WRITE_CONFLICT_CODE, DUPLICATE_KEY_CODE]));
        assert!(!has_duplicate_key(&[WRITE_CONFLICT_CODE]));
        assert!(!has_duplicate_key(&[]));
    }
}
