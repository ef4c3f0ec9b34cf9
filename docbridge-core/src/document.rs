//! Core traits for typed documents and their BSON representation.
//!
//! Stored records are schema-less [`bson::Document`]s. The only structural requirement is a
//! top-level string field named [`ID_KEY`], which acts as the primary key and as the source
//! of pagination cursors. The [`Document`] trait lets typed values opt into that convention.

use bson::{
    Bson,
    de::deserialize_from_document,
    ser::serialize_to_document,
};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identifier field every stored document carries.
pub const ID_KEY: &str = "id";

/// Core trait that all typed documents stored through a collection must implement.
///
/// # Example
///
/// ```ignore
/// use docbridge::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Workspace {
///     pub id: String,
///     pub name: String,
/// }
///
/// impl Document for Workspace {
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "workspaces"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns this document's unique identifier, stored under [`ID_KEY`].
    fn id(&self) -> &str;

    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing BSON conversion for documents.
///
/// Automatically implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Serializes this value into a raw BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or if the serialized `id` field does not
    /// match [`Document::id`].
    fn to_document(&self) -> DocumentStoreResult<bson::Document>;

    /// Deserializes a value from a raw BSON document.
    fn from_document(document: bson::Document) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_document(&self) -> DocumentStoreResult<bson::Document> {
        let document = serialize_to_document(self)?;

        match document.get(ID_KEY) {
            Some(Bson::String(id)) if id == self.id() => Ok(document),
            _ => Err(DocumentStoreError::internal_msg(format!(
                "document {} does not serialize its identifier under `{}`",
                self.id(),
                ID_KEY,
            ))),
        }
    }

    fn from_document(document: bson::Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl Document for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn collection_name() -> &'static str {
            "notes"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Renamed {
        #[serde(rename = "key")]
        id: String,
    }

    impl Document for Renamed {
        fn id(&self) -> &str {
            &self.id
        }

        fn collection_name() -> &'static str {
            "renamed"
        }
    }

    #[test]
    fn converts_to_and_from_bson() {
        let note = Note { id: "n1".into(), body: "hello".into() };
        let document = note.to_document().unwrap();
        assert_eq!(document, doc! { "id": "n1", "body": "hello" });
        assert_eq!(Note::from_document(document).unwrap(), note);
    }

    #[test]
    fn rejects_documents_without_identifier_field() {
        let err = Renamed { id: "r1".into() }.to_document().unwrap_err();
        assert!(matches!(err, DocumentStoreError::Internal(_)));
    }
}
