//! Shared test fixtures: an in-process backend with scripted pages,
//! mutations, and failure injection.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::{PageFetch, RecordSource};
use crate::config::{ApiConfig, CacheConfig, Config, NavigatorConfig};
use crate::error::{NavError, Result};
use crate::navigator::Navigator;
use crate::records::{
    ConversationThread, Record, RecordBody, RecordFlags, RecordId, ReplyDraft, ThreadMessage,
};
use crate::retry::RetryConfig;
use crate::session::InMemorySessionStore;

/// Config with an unused endpoint, for navigator tests against the fake.
pub(crate) fn test_config(page_size: usize, prefetch_threshold: usize) -> Config {
    Config {
        api: ApiConfig {
            base_url: "http://backend.invalid/v1".to_string(),
            timeout_secs: 5,
            auth_token: None,
        },
        navigator: NavigatorConfig {
            page_size,
            prefetch_threshold,
            mark_read_on_open: true,
        },
        cache: CacheConfig::default(),
        retry: RetryConfig {
            max_retries: 0,
            initial_delay_ms: 1,
            max_delay_secs: 1,
        },
    }
}

/// Navigator over a fresh fake backend and in-memory session store.
pub(crate) fn navigator_with(
    records: usize,
    page_size: usize,
    prefetch_threshold: usize,
) -> (Arc<FakeBackend>, Arc<InMemorySessionStore>, Navigator) {
    let backend = Arc::new(FakeBackend::with_records(records, page_size));
    let store = Arc::new(InMemorySessionStore::new());
    let nav = Navigator::new(
        backend.clone(),
        store.clone(),
        &test_config(page_size, prefetch_threshold),
    );
    (backend, store, nav)
}

/// Deterministic record used across navigator and window tests.
pub(crate) fn record(n: usize) -> Record {
    Record {
        id: RecordId::new(format!("r{}", n)),
        from_addr: format!("customer{}@example.com", n),
        from_name: None,
        subject: format!("Ticket #{}", n),
        preview: None,
        body: RecordBody {
            text: Some(format!("Body of ticket {}", n)),
            html: None,
        },
        received_at: 1_700_000_000 + n as i64,
        flags: RecordFlags::empty(),
        thread: None,
    }
}

/// In-memory backend over a mutable record list, paginated like the
/// real list endpoint. Deleting shifts later records down, exactly as
/// the server-side collection would.
pub(crate) struct FakeBackend {
    page_size: usize,
    records: Mutex<Vec<Record>>,
    failing_pages: Mutex<HashSet<u32>>,
    pub(crate) fetch_count: AtomicUsize,
    pub(crate) mark_read_count: AtomicUsize,
}

impl FakeBackend {
    pub(crate) fn with_records(count: usize, page_size: usize) -> Self {
        Self {
            page_size,
            records: Mutex::new((0..count).map(record).collect()),
            failing_pages: Mutex::new(HashSet::new()),
            fetch_count: AtomicUsize::new(0),
            mark_read_count: AtomicUsize::new(0),
        }
    }

    /// Make fetches of `page` fail until cleared.
    pub(crate) fn fail_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    pub(crate) fn clear_failures(&self) {
        self.failing_pages.lock().unwrap().clear();
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub(crate) fn remaining(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    fn remove(&self, id: &RecordId) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        match records.iter().position(|r| &r.id == id) {
            Some(pos) => {
                records.remove(pos);
                Ok(())
            }
            None => Err(NavError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                endpoint: "/records".to_string(),
                detail: format!("no record {}", id),
            }),
        }
    }
}

#[async_trait]
impl RecordSource for FakeBackend {
    async fn fetch_page(&self, page: u32) -> Result<PageFetch> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(NavError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                endpoint: "/records".to_string(),
                detail: "injected failure".to_string(),
            });
        }

        let records = self.records.lock().unwrap();
        let total_pages = records.len().div_ceil(self.page_size) as u32;
        let start = (page as usize - 1) * self.page_size;
        let slice = if start < records.len() {
            records[start..(start + self.page_size).min(records.len())].to_vec()
        } else {
            Vec::new()
        };
        Ok(PageFetch {
            records: slice,
            total_pages,
        })
    }

    async fn mark_read(&self, id: &RecordId) -> Result<()> {
        self.mark_read_count.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        if let Some(record) = records.iter_mut().find(|r| &r.id == id) {
            record.flags.insert(RecordFlags::SEEN);
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        self.remove(id)
    }

    async fn reply_and_close(&self, id: &RecordId, _reply: &ReplyDraft) -> Result<()> {
        self.remove(id)
    }

    async fn fetch_thread(&self, id: &RecordId) -> Result<ConversationThread> {
        let records = self.records.lock().unwrap();
        let record = records
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| NavError::NotMaterialized(id.clone()))?;
        Ok(ConversationThread {
            messages: vec![ThreadMessage {
                author_addr: record.from_addr.clone(),
                author_name: None,
                body: record.body.display_text(),
                sent_at: record.received_at,
                outbound: false,
            }],
        })
    }
}
