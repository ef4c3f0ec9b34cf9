//! The document collection facade.
//!
//! A [`Collection`] executes queries and writes against one logical collection of a
//! [`StoreBackend`]. It holds nothing but the backend handle and the collection name, so it
//! is cheap to clone and safe to share; concurrency control belongs to the backend.
//!
//! # Streaming
//!
//! [`Collection::find`] feeds results into a [`Consumer`] one document at a time and ends
//! with a single `None`. The driver stream lives in a local for the duration of the call,
//! so it is released on every exit path: success, consumer error, driver error, or the
//! caller dropping the future mid-scan.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::prelude::*;
//! use docbridge::memory::InMemoryStore;
//!
//! let users = Collection::new("users", InMemoryStore::new());
//! users.save_one("u1", doc! { "id": "u1", "name": "Ann" }).await?;
//!
//! let mut found = SliceConsumer::<User>::new();
//! users.find(&Filter::eq("name", "Ann"), &mut found, FindOptions::default()).await?;
//! ```

use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, instrument, warn};

use crate::{
    backend::{DocumentStream, StoreBackend},
    bulk::BulkWriter,
    consumer::Consumer,
    document::ID_KEY,
    error::{DocumentStoreError, DocumentStoreResult},
    pagination::{Cursor, CursorPagination, OffsetPagination, PageInfo, Pagination},
    query::{Expr, Filter, FindOptions, SortDirection, Update},
};

/// Query and write operations against one collection of a backend.
#[derive(Debug, Clone)]
pub struct Collection<B: StoreBackend> {
    name: String,
    backend: B,
}

impl<B: StoreBackend> Collection<B> {
    /// Binds the collection `name` of `backend`.
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self { name: name.into(), backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Starts an ordered bulk batch against this collection.
    pub fn bulk(&self) -> BulkWriter<'_, B> {
        BulkWriter::new(self)
    }

    /// Streams every document matching `filter` into `consumer`.
    ///
    /// Disk use for large sorts is allowed unless `options` says otherwise.
    ///
    /// # Errors
    ///
    /// - Any consumer error other than [`DocumentStoreError::EndOfStream`], unchanged.
    /// - Classified driver errors from opening or advancing the stream.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn find<C>(&self, filter: &Expr, consumer: &mut C, options: FindOptions) -> DocumentStoreResult<()>
    where
        C: Consumer + Send + ?Sized,
    {
        let mut options = options;
        options.allow_disk_use.get_or_insert(true);

        let stream = self.backend
            .find(&self.name, filter, options)
            .await?;

        drain(stream, consumer).await
    }

    /// Delivers the first document matching `filter` to `consumer`.
    ///
    /// Unlike [`find`](Self::find), no terminal `None` is sent.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing matches.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn find_one<C>(&self, filter: &Expr, consumer: &mut C, options: FindOptions) -> DocumentStoreResult<()>
    where
        C: Consumer + Send + ?Sized,
    {
        let document = self.backend
            .find_one(&self.name, filter, options)
            .await?
            .ok_or_else(|| {
                debug!("find_one matched nothing");
                DocumentStoreError::NotFound
            })?;

        feed(consumer, document).map(|_| ())
    }

    /// Counts the documents matching `filter`. Zero is a valid count.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn count(&self, filter: &Expr) -> DocumentStoreResult<u64> {
        self.backend.count(&self.name, filter).await
    }

    /// Deletes every document matching `filter`. Matching nothing is not an error.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn remove_all(&self, filter: &Expr) -> DocumentStoreResult<()> {
        let deleted = self.backend.delete_many(&self.name, filter).await?;
        debug!(deleted, "removed documents");
        Ok(())
    }

    /// Deletes at most one document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::NotFound`] when nothing matched.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn remove_one(&self, filter: &Expr) -> DocumentStoreResult<()> {
        match self.backend.delete_one(&self.name, filter).await? {
            0 => Err(DocumentStoreError::NotFound),
            _ => Ok(()),
        }
    }

    /// Upserts `replacement` under the identifier `id`.
    pub async fn save_one(&self, id: &str, replacement: Document) -> DocumentStoreResult<()> {
        self.replace_one(&Filter::id(id), replacement).await
    }

    /// Replaces the first match of `filter`, inserting `replacement` if nothing matched.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn replace_one(&self, filter: &Expr, replacement: Document) -> DocumentStoreResult<()> {
        self.backend
            .replace_one(&self.name, filter, replacement, true)
            .await
    }

    /// Sets the fields of `partial` on the document `id`, creating it if absent.
    #[instrument(skip_all, fields(collection = %self.name, id = %id))]
    pub async fn set_one(&self, id: &str, partial: Document) -> DocumentStoreResult<()> {
        self.backend
            .update_one(&self.name, &Filter::id(id), partial, true)
            .await
    }

    /// Upserts `updates[i]` under `ids[i]` for every `i`, as one ordered batch.
    ///
    /// If either side is empty this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidParams`] without writing anything when the two
    /// sides differ in length.
    #[instrument(skip_all, fields(collection = %self.name, count = ids.len()))]
    pub async fn save_all(&self, ids: Vec<String>, updates: Vec<Document>) -> DocumentStoreResult<()> {
        if ids.is_empty() || updates.is_empty() {
            return Ok(());
        }
        if ids.len() != updates.len() {
            return Err(DocumentStoreError::InvalidParams(format!(
                "invalid save args: {} ids for {} documents",
                ids.len(),
                updates.len(),
            )));
        }

        let mut writer = BulkWriter::with_capacity(self, ids.len());
        for (id, replacement) in ids.into_iter().zip(updates) {
            writer.push_replace_one(Filter::id(id), replacement, true);
        }
        writer.submit().await
    }

    /// Sets the fields of `set` on every document matching `filter`.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn update_many(&self, filter: &Expr, set: Document) -> DocumentStoreResult<()> {
        self.backend
            .update_many(&self.name, filter, set, Vec::new())
            .await
    }

    /// Submits one ordered batch with a mass-update per item of `updates`.
    ///
    /// Empty input is a no-op.
    #[instrument(skip_all, fields(collection = %self.name, count = updates.len()))]
    pub async fn update_many_many(&self, updates: Vec<Update>) -> DocumentStoreResult<()> {
        let mut writer = BulkWriter::with_capacity(self, updates.len());
        for Update { filter, update, array_filters } in updates {
            writer.push_update_many(filter, update, array_filters);
        }
        writer.submit().await
    }

    /// Streams one window of the documents matching `filter`, ordered by identifier.
    ///
    /// - `None`: every match.
    /// - [`Pagination::Cursor`]: `first`/`after` scans forward, `last`/`before` backward.
    /// - [`Pagination::Offset`]: skips `offset` matches and takes `limit`.
    ///
    /// Documents are always delivered in ascending identifier order, followed by the
    /// terminal `None`.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::InvalidParams`] for negative sizes or a request that mixes
    ///   forward and backward arguments.
    /// - [`DocumentStoreError::Internal`] if a document in the window has no string `id`.
    #[instrument(skip_all, fields(collection = %self.name))]
    pub async fn paginate<C>(
        &self,
        filter: &Expr,
        pagination: Option<&Pagination>,
        consumer: &mut C,
    ) -> DocumentStoreResult<PageInfo>
    where
        C: Consumer + Send + ?Sized,
    {
        let total_count = self.count(filter).await?;

        let (documents, has_next_page, has_previous_page) = match pagination {
            None => (self.fetch(filter, ascending().build()).await?, false, false),
            Some(Pagination::Offset(offset)) => self.offset_window(filter, offset, total_count).await?,
            Some(Pagination::Cursor(cursor)) => self.cursor_window(filter, cursor).await?,
        };

        let start_cursor = documents.first().map(get_cursor).transpose()?;
        let end_cursor = documents.last().map(get_cursor).transpose()?;

        deliver(consumer, documents)?;

        Ok(PageInfo::builder(total_count)
            .with_cursors(start_cursor, end_cursor)
            .with_next_page(has_next_page)
            .with_previous_page(has_previous_page)
            .build())
    }

    async fn offset_window(
        &self,
        filter: &Expr,
        pagination: &OffsetPagination,
        total_count: u64,
    ) -> DocumentStoreResult<(Vec<Document>, bool, bool)> {
        let offset = non_negative(pagination.offset, "offset")?;
        let limit = non_negative(pagination.limit, "limit")?;

        // A zero limit means "unbounded" to most drivers.
        let documents = if limit == 0 {
            Vec::new()
        } else {
            self.fetch(filter, ascending().skip(offset).limit(limit).build()).await?
        };

        let has_next_page = offset.saturating_add(documents.len() as u64) < total_count;
        Ok((documents, has_next_page, offset > 0))
    }

    async fn cursor_window(
        &self,
        filter: &Expr,
        pagination: &CursorPagination,
    ) -> DocumentStoreResult<(Vec<Document>, bool, bool)> {
        let forward = pagination.first.is_some() || pagination.after.is_some();
        let backward = pagination.last.is_some() || pagination.before.is_some();

        if forward && backward {
            return Err(DocumentStoreError::InvalidParams(
                "cursor pagination cannot combine first/after with last/before".into(),
            ));
        }

        if backward {
            let last = pagination
                .last
                .map(|last| non_negative(last, "last"))
                .transpose()?;
            let scoped = match &pagination.before {
                Some(before) => filter.clone().and(Filter::lt(ID_KEY, before.as_str())),
                None => filter.clone(),
            };

            let mut options = FindOptions::builder().sort(ID_KEY, SortDirection::Desc);
            if let Some(last) = last {
                options = options.limit(lookahead(last));
            }

            let mut documents = self.fetch(&scoped, options.build()).await?;
            let has_previous_page = trim_window(&mut documents, last);
            documents.reverse();

            return Ok((documents, pagination.before.is_some(), has_previous_page));
        }

        let first = pagination
            .first
            .map(|first| non_negative(first, "first"))
            .transpose()?;
        let scoped = match &pagination.after {
            Some(after) => filter.clone().and(Filter::gt(ID_KEY, after.as_str())),
            None => filter.clone(),
        };

        let mut options = ascending();
        if let Some(first) = first {
            options = options.limit(lookahead(first));
        }

        let mut documents = self.fetch(&scoped, options.build()).await?;
        let has_next_page = trim_window(&mut documents, first);

        Ok((documents, has_next_page, pagination.after.is_some()))
    }

    async fn fetch(&self, filter: &Expr, options: FindOptions) -> DocumentStoreResult<Vec<Document>> {
        let mut options = options;
        options.allow_disk_use.get_or_insert(true);

        self.backend
            .find(&self.name, filter, options)
            .await?
            .try_collect()
            .await
    }
}

/// Extracts the pagination cursor of a raw document.
///
/// # Errors
///
/// A missing or non-string `id` field is a malformed record and yields
/// [`DocumentStoreError::Internal`].
pub fn get_cursor(document: &Document) -> DocumentStoreResult<Cursor> {
    match document.get(ID_KEY) {
        Some(Bson::String(id)) => Ok(Cursor::new(id.clone())),
        Some(other) => Err(DocumentStoreError::internal_msg(format!(
            "failed to unmarshal cursor: `{}` is {:?}, not a string",
            ID_KEY,
            other.element_type(),
        ))),
        None => Err(DocumentStoreError::internal_msg(format!(
            "failed to lookup cursor: no `{}` field",
            ID_KEY,
        ))),
    }
}

fn ascending() -> crate::query::FindOptionsBuilder {
    FindOptions::builder().sort(ID_KEY, SortDirection::Asc)
}

fn non_negative(value: i64, name: &str) -> DocumentStoreResult<u64> {
    u64::try_from(value)
        .map_err(|_| DocumentStoreError::InvalidParams(format!("{name} must not be negative")))
}

/// Window size plus one lookahead document, clamped to what every driver accepts as a limit.
fn lookahead(size: u64) -> u64 {
    size.saturating_add(1).min(i64::MAX as u64)
}

/// Truncates an over-fetched window to `size`, reporting whether anything was cut.
fn trim_window(documents: &mut Vec<Document>, size: Option<u64>) -> bool {
    match size {
        Some(size) if documents.len() as u64 > size => {
            documents.truncate(size as usize);
            true
        }
        _ => false,
    }
}

/// Hands one document to the consumer. `Ok(false)` means the consumer asked to stop.
fn feed<C>(consumer: &mut C, document: Document) -> DocumentStoreResult<bool>
where
    C: Consumer + ?Sized,
{
    match consumer.consume(Some(document)) {
        Ok(()) => Ok(true),
        Err(DocumentStoreError::EndOfStream) => Ok(false),
        Err(err) => {
            warn!(error = %err, "consumer aborted the stream");
            Err(err)
        }
    }
}

/// Sends the terminal `None`, swallowing the end-of-stream sentinel.
fn finish<C>(consumer: &mut C) -> DocumentStoreResult<()>
where
    C: Consumer + ?Sized,
{
    match consumer.consume(None) {
        Ok(()) | Err(DocumentStoreError::EndOfStream) => Ok(()),
        Err(err) => Err(err),
    }
}

async fn drain<C>(mut stream: DocumentStream, consumer: &mut C) -> DocumentStoreResult<()>
where
    C: Consumer + Send + ?Sized,
{
    while let Some(document) = stream.next().await {
        if !feed(consumer, document?)? {
            return Ok(());
        }
    }
    drop(stream);

    finish(consumer)
}

fn deliver<C>(consumer: &mut C, documents: Vec<Document>) -> DocumentStoreResult<()>
where
    C: Consumer + ?Sized,
{
    for document in documents {
        if !feed(consumer, document)? {
            return Ok(());
        }
    }

    finish(consumer)
}
