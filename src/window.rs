//! Windowed cache over the server-paginated record list.
//!
//! The window is the client-materialized, contiguous run of backend
//! pages: concatenating the loaded pages in page order reproduces a
//! gap-free sub-range of the logical sequence. Positions in the window
//! are only meaningful between structural changes; a prepend shifts
//! every position up by the prepended record count (the caller must
//! rebase any index it tracks), and a mutation splice shifts later
//! positions down by one. The two shifts are deliberately kept as
//! separate operations.

use std::collections::{BTreeSet, HashMap};

use crate::api::RecordSource;
use crate::error::{NavError, Result};
use crate::records::{Record, RecordId};

/// How a fetched page is installed into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Discard the window and start over from this page alone.
    Replace,
    /// Attach the page after the loaded run.
    Append,
    /// Attach the page before the loaded run, shifting every existing
    /// position by the page's record count.
    Prepend,
}

/// Outcome of a `load` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The page was fetched and installed; `added` records entered the
    /// window. For a prepend this is the amount to rebase tracked
    /// indices by.
    Installed { added: usize },
    /// The page was already part of the window; nothing changed.
    AlreadyLoaded,
}

pub struct WindowCache {
    page_size: usize,
    /// Ordered identifiers of every materialized record.
    ids: Vec<RecordId>,
    /// Payloads by stable identifier.
    records: HashMap<RecordId, Record>,
    /// Backend pages currently backing the window, always contiguous.
    loaded_pages: BTreeSet<u32>,
    /// Total page count reported by the most recent fetch.
    total_pages: Option<u32>,
}

impl WindowCache {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ids: Vec::new(),
            records: HashMap::new(),
            loaded_pages: BTreeSet::new(),
            total_pages: None,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn loaded_pages(&self) -> &BTreeSet<u32> {
        &self.loaded_pages
    }

    pub fn first_page(&self) -> Option<u32> {
        self.loaded_pages.first().copied()
    }

    pub fn last_page(&self) -> Option<u32> {
        self.loaded_pages.last().copied()
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    pub fn is_loaded(&self, page: u32) -> bool {
        self.loaded_pages.contains(&page)
    }

    pub fn id_at(&self, index: usize) -> Option<&RecordId> {
        self.ids.get(index)
    }

    pub fn record_at(&self, index: usize) -> Option<&Record> {
        self.ids.get(index).and_then(|id| self.records.get(id))
    }

    /// Lookup by stable identifier. Index-based access is only valid for
    /// the currently materialized list; identifiers survive rebuilds.
    pub fn lookup(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn record_mut(&mut self, id: &RecordId) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    /// Fetch `page` through `source` and install it.
    ///
    /// Loading an already-loaded page with a non-replace mode is a
    /// no-op. Append/prepend only accept the page adjacent to the
    /// loaded run, so the window can never acquire a gap. The fetch
    /// completes before any state is touched: a failed load leaves the
    /// window exactly as it was.
    pub async fn load(
        &mut self,
        source: &dyn RecordSource,
        page: u32,
        mode: LoadMode,
    ) -> Result<LoadStatus> {
        if mode != LoadMode::Replace && self.is_loaded(page) {
            tracing::trace!("Page {} already loaded, skipping {:?}", page, mode);
            return Ok(LoadStatus::AlreadyLoaded);
        }
        if !self.is_empty() {
            let adjacent = match mode {
                LoadMode::Replace => true,
                LoadMode::Append => self.last_page().map(|p| p + 1) == Some(page),
                LoadMode::Prepend => self.first_page() == Some(page + 1),
            };
            if !adjacent {
                return Err(NavError::NonAdjacentPage { page });
            }
        }

        let fetch = source.fetch_page(page).await?;
        let added = fetch.records.len();

        match mode {
            LoadMode::Replace => {
                self.ids.clear();
                self.records.clear();
                self.loaded_pages.clear();
            }
            LoadMode::Append | LoadMode::Prepend => {}
        }

        let new_ids: Vec<RecordId> = fetch.records.iter().map(|r| r.id.clone()).collect();
        for record in fetch.records {
            self.records.insert(record.id.clone(), record);
        }
        match mode {
            LoadMode::Replace | LoadMode::Append => self.ids.extend(new_ids),
            LoadMode::Prepend => {
                let mut ids = new_ids;
                ids.append(&mut self.ids);
                self.ids = ids;
            }
        }
        self.loaded_pages.insert(page);
        self.total_pages = Some(fetch.total_pages);

        tracing::debug!(
            "Loaded page {} ({:?}): {} records, window now {} over pages {:?}",
            page,
            mode,
            added,
            self.ids.len(),
            self.loaded_pages
        );

        Ok(LoadStatus::Installed { added })
    }

    /// Remove the record at `index` from the window, dropping its
    /// payload. Every later position shifts down by one. This is the
    /// mutation shift, not the prepend shift: the two must never be
    /// conflated, and the window is page-misaligned until the next
    /// rebuild.
    pub fn splice_remove(&mut self, index: usize) -> Option<RecordId> {
        if index >= self.ids.len() {
            return None;
        }
        let id = self.ids.remove(index);
        self.records.remove(&id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::FakeBackend;

    #[tokio::test]
    async fn test_replace_resets_window() {
        let backend = FakeBackend::with_records(50, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 1, LoadMode::Replace)
            .await
            .unwrap();
        window.load(&backend, 2, LoadMode::Append).await.unwrap();
        assert_eq!(window.len(), 40);

        window
            .load(&backend, 3, LoadMode::Replace)
            .await
            .unwrap();
        assert_eq!(window.len(), 10); // short last page
        assert_eq!(window.loaded_pages().len(), 1);
        assert_eq!(window.first_page(), Some(3));
        assert_eq!(window.id_at(0).unwrap().as_str(), "r40");
    }

    #[tokio::test]
    async fn test_append_and_prepend_keep_order() {
        let backend = FakeBackend::with_records(60, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 2, LoadMode::Replace)
            .await
            .unwrap();
        window.load(&backend, 3, LoadMode::Append).await.unwrap();
        let status = window.load(&backend, 1, LoadMode::Prepend).await.unwrap();

        assert_eq!(status, LoadStatus::Installed { added: 20 });
        assert_eq!(window.len(), 60);
        assert_eq!(window.loaded_pages().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        // Concatenation in page order reproduces the logical sequence
        for (pos, id) in window.ids().iter().enumerate() {
            assert_eq!(id.as_str(), format!("r{}", pos));
        }
    }

    #[tokio::test]
    async fn test_prepend_shifts_positions_by_page_size() {
        let backend = FakeBackend::with_records(60, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 2, LoadMode::Replace)
            .await
            .unwrap();
        let before = window.id_at(2).unwrap().clone();

        window.load(&backend, 1, LoadMode::Prepend).await.unwrap();
        assert_eq!(window.id_at(2 + 20), Some(&before));
    }

    #[tokio::test]
    async fn test_load_is_idempotent_for_loaded_pages() {
        let backend = FakeBackend::with_records(50, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 1, LoadMode::Replace)
            .await
            .unwrap();
        window.load(&backend, 2, LoadMode::Append).await.unwrap();
        let fetches = backend.fetches();
        let ids_before = window.ids().to_vec();

        let status = window.load(&backend, 2, LoadMode::Append).await.unwrap();
        assert_eq!(status, LoadStatus::AlreadyLoaded);
        assert_eq!(backend.fetches(), fetches);
        assert_eq!(window.ids(), &ids_before[..]);
        assert_eq!(window.loaded_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_non_adjacent_load_is_rejected() {
        let backend = FakeBackend::with_records(100, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 2, LoadMode::Replace)
            .await
            .unwrap();
        let err = window.load(&backend, 4, LoadMode::Append).await.unwrap_err();
        assert!(matches!(err, NavError::NonAdjacentPage { page: 4 }));
        // Gap never opened
        assert_eq!(window.loaded_pages().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_window_untouched() {
        let backend = FakeBackend::with_records(50, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 1, LoadMode::Replace)
            .await
            .unwrap();
        backend.fail_page(2);

        let err = window.load(&backend, 2, LoadMode::Append).await.unwrap_err();
        assert!(err.is_fetch_failure());
        assert_eq!(window.len(), 20);
        assert!(!window.is_loaded(2));
    }

    #[tokio::test]
    async fn test_splice_remove_shifts_down_by_one() {
        let backend = FakeBackend::with_records(20, 20);
        let mut window = WindowCache::new(20);
        window
            .load(&backend, 1, LoadMode::Replace)
            .await
            .unwrap();

        let removed = window.splice_remove(10).unwrap();
        assert_eq!(removed.as_str(), "r10");
        assert_eq!(window.len(), 19);
        assert_eq!(window.id_at(10).unwrap().as_str(), "r11");
        assert!(window.lookup(&removed).is_none());

        assert!(window.splice_remove(99).is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_id() {
        let backend = FakeBackend::with_records(30, 20);
        let mut window = WindowCache::new(20);
        window
            .load(&backend, 1, LoadMode::Replace)
            .await
            .unwrap();

        let id = RecordId::from("r7");
        assert_eq!(window.lookup(&id).unwrap().subject, "Ticket #7");
        assert!(window.lookup(&RecordId::from("r25")).is_none());
    }

    #[tokio::test]
    async fn test_page_coverage_invariant() {
        let backend = FakeBackend::with_records(100, 20);
        let mut window = WindowCache::new(20);

        window
            .load(&backend, 3, LoadMode::Replace)
            .await
            .unwrap();
        window.load(&backend, 4, LoadMode::Append).await.unwrap();
        window.load(&backend, 2, LoadMode::Prepend).await.unwrap();
        window.load(&backend, 5, LoadMode::Append).await.unwrap();

        assert_eq!(window.len(), window.loaded_pages().len() * window.page_size());
        assert_eq!(window.total_pages(), Some(5));
    }
}
