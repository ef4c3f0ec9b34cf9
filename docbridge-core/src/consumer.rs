//! The streaming sink protocol for query results.
//!
//! A [`Consumer`] is bound to exactly one query execution. It receives every result
//! document as `Some(document)` in driver order, followed by exactly one `None` signalling
//! end-of-stream. Returning [`DocumentStoreError::EndOfStream`] from any call stops the
//! iteration and is reported to the caller as success; any other error aborts the query
//! and is returned unchanged.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::consumer::SliceConsumer;
//!
//! let mut users = SliceConsumer::<User>::new();
//! collection.find(&Filter::eq("name", "ann"), &mut users, FindOptions::default()).await?;
//! let users: Vec<User> = users.into_items();
//! ```

use bson::Document;
use std::marker::PhantomData;

use crate::{
    document::DocumentExt,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A one-shot streaming sink for raw result documents.
pub trait Consumer {
    /// Receives the next document, or `None` once the stream is exhausted.
    fn consume(&mut self, document: Option<Document>) -> DocumentStoreResult<()>;
}

impl<F> Consumer for F
where
    F: FnMut(Option<Document>) -> DocumentStoreResult<()>,
{
    fn consume(&mut self, document: Option<Document>) -> DocumentStoreResult<()> {
        self(document)
    }
}

/// Decodes every received document into `D` and collects the results.
#[derive(Debug)]
pub struct SliceConsumer<D> {
    items: Vec<D>,
}

impl<D: DocumentExt> SliceConsumer<D> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn items(&self) -> &[D] {
        &self.items
    }

    pub fn into_items(self) -> Vec<D> {
        self.items
    }

    /// Returns the first decoded item, failing with `NotFound` if nothing was received.
    pub fn into_first(self) -> DocumentStoreResult<D> {
        self.items
            .into_iter()
            .next()
            .ok_or(DocumentStoreError::NotFound)
    }
}

impl<D: DocumentExt> Default for SliceConsumer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DocumentExt> Consumer for SliceConsumer<D> {
    fn consume(&mut self, document: Option<Document>) -> DocumentStoreResult<()> {
        if let Some(document) = document {
            self.items.push(D::from_document(document)?);
        }
        Ok(())
    }
}

/// Decodes every received document into `D` and hands it to a callback.
///
/// The callback may return [`DocumentStoreError::EndOfStream`] to stop early.
pub struct SliceFuncConsumer<D, F> {
    func: F,
    _marker: PhantomData<fn(D)>,
}

impl<D, F> SliceFuncConsumer<D, F>
where
    D: DocumentExt,
    F: FnMut(D) -> DocumentStoreResult<()>,
{
    pub fn new(func: F) -> Self {
        Self { func, _marker: PhantomData }
    }
}

impl<D, F> Consumer for SliceFuncConsumer<D, F>
where
    D: DocumentExt,
    F: FnMut(D) -> DocumentStoreResult<()>,
{
    fn consume(&mut self, document: Option<Document>) -> DocumentStoreResult<()> {
        match document {
            Some(document) => (self.func)(D::from_document(document)?),
            None => Ok(()),
        }
    }
}
