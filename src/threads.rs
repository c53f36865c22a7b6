//! Hot cache for lazily loaded conversation threads.
//!
//! Thread payloads are fetched on first view and kept in a moka cache
//! so re-visiting a record while stepping back and forth never re-hits
//! the backend inside the TTL.

use std::time::Duration;

use crate::api::RecordSource;
use crate::error::Result;
use crate::records::{ConversationThread, RecordId};

type Cache = moka::future::Cache<RecordId, ConversationThread>;

pub struct ThreadCache {
    cache: Cache,
}

impl ThreadCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: moka::future::Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get a record's conversation thread, fetching and caching on miss.
    pub async fn get_or_fetch(
        &self,
        source: &dyn RecordSource,
        id: &RecordId,
    ) -> Result<ConversationThread> {
        if let Some(thread) = self.cache.get(id).await {
            return Ok(thread);
        }

        let thread = source.fetch_thread(id).await?;
        self.cache.insert(id.clone(), thread.clone()).await;
        Ok(thread)
    }

    /// Drop a cached thread, e.g. after its record leaves the active set.
    pub async fn invalidate(&self, id: &RecordId) {
        self.cache.invalidate(id).await;
    }
}
