//! Backend record source: the page fetcher and mutation endpoints.

mod rest;

pub use rest::RestClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::records::{ConversationThread, Record, RecordId, ReplyDraft};

/// One backend page of records, in the backend's defined order.
#[derive(Debug, Clone, Default)]
pub struct PageFetch {
    pub records: Vec<Record>,
    /// Total page count of the logical sequence at fetch time.
    pub total_pages: u32,
}

/// Backend operations the navigator depends on.
///
/// Injected as a trait so unit tests can run against an in-process fake
/// with scripted pages and failures. `fetch_page` must not retry
/// internally: the navigator surfaces the first failure and treats the
/// attempted transition as a no-op.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one 1-based page of the record list.
    async fn fetch_page(&self, page: u32) -> Result<PageFetch>;

    /// Mark a record as read. Fire-and-forget from the navigator's
    /// perspective; safe to retry.
    async fn mark_read(&self, id: &RecordId) -> Result<()>;

    /// Delete a record, removing it from the active set.
    async fn delete(&self, id: &RecordId) -> Result<()>;

    /// Send a reply and close the record, removing it from the active set.
    async fn reply_and_close(&self, id: &RecordId, reply: &ReplyDraft) -> Result<()>;

    /// Fetch the conversation history of a record.
    async fn fetch_thread(&self, id: &RecordId) -> Result<ConversationThread>;
}
