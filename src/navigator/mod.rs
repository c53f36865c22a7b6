//! Record navigator: logical stepping over the windowed cache.
//!
//! The navigator owns the window exclusively. It tracks the current
//! position as a window-relative index; the collection-global index
//! (`(first_page - 1) * page_size + index`) is what gets persisted and
//! displayed. A prepend shifts every window position, so the tracked
//! index is rebased immediately, before the new position is visible to
//! any consumer.
//!
//! All navigation calls are serialized through one async mutex: two
//! overlapping steps would otherwise interleave their rebase arithmetic
//! and corrupt the index.

mod mutation;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::api::RecordSource;
use crate::config::Config;
use crate::error::{NavError, Result};
use crate::records::{ConversationThread, Record, RecordFlags, RecordId};
use crate::retry::{RetryConfig, with_backoff};
use crate::session::{NavCheckpoint, SessionStore};
use crate::threads::ThreadCache;
use crate::window::{LoadMode, LoadStatus, WindowCache};

/// Lifecycle state of the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing loaded yet.
    Idle,
    /// A page fetch is in flight.
    Loading,
    /// Positioned on a record.
    Ready,
    /// Every record has been removed; the caller must navigate away.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

impl Direction {
    fn delta(self) -> isize {
        match self {
            Direction::Backward => -1,
            Direction::Forward => 1,
        }
    }
}

/// Result of a step request.
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// The navigator moved to this record.
    Moved(Record),
    /// The step would leave the known sequence; nothing changed.
    Boundary,
}

impl StepOutcome {
    pub fn is_boundary(&self) -> bool {
        matches!(self, StepOutcome::Boundary)
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            StepOutcome::Moved(record) => Some(record),
            StepOutcome::Boundary => None,
        }
    }
}

/// Result of an operation that re-anchors the navigator on a record.
#[derive(Debug, Clone)]
pub enum Anchor {
    /// The navigator is positioned on this record.
    Current(Record),
    /// The collection has no records left.
    Exhausted,
}

impl Anchor {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Anchor::Exhausted)
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Anchor::Current(record) => Some(record),
            Anchor::Exhausted => None,
        }
    }
}

struct NavCore {
    window: WindowCache,
    /// Window-relative index of the current record.
    index: usize,
    phase: Phase,
}

pub struct Navigator {
    source: Arc<dyn RecordSource>,
    store: Arc<dyn SessionStore>,
    threads: ThreadCache,
    retry: RetryConfig,
    page_size: usize,
    threshold: usize,
    mark_read_on_open: bool,
    core: Mutex<NavCore>,
}

/// Compensate a tracked index for records prepended in front of it.
/// This is the prepend shift; removing a record mid-window is
/// `WindowCache::splice_remove` and shifts the other way by one.
fn rebase_forward(index: usize, amount: usize) -> usize {
    index + amount
}

impl Navigator {
    pub fn new(
        source: Arc<dyn RecordSource>,
        store: Arc<dyn SessionStore>,
        config: &Config,
    ) -> Self {
        let nav = &config.navigator;
        Self {
            source,
            store,
            threads: ThreadCache::new(
                config.cache.max_cached_threads,
                Duration::from_secs(config.cache.thread_ttl_secs),
            ),
            retry: config.retry.clone(),
            page_size: nav.page_size,
            threshold: nav.prefetch_threshold,
            mark_read_on_open: nav.mark_read_on_open,
            core: Mutex::new(NavCore {
                window: WindowCache::new(nav.page_size),
                index: 0,
                phase: Phase::Idle,
            }),
        }
    }

    pub async fn phase(&self) -> Phase {
        self.core.lock().await.phase
    }

    /// The committed current record, if any.
    pub async fn current(&self) -> Option<Record> {
        let core = self.core.lock().await;
        if core.phase != Phase::Ready {
            return None;
        }
        core.window.record_at(core.index).cloned()
    }

    /// Collection-global index of the current record, for display.
    pub async fn position(&self) -> Option<usize> {
        let core = self.core.lock().await;
        (core.phase == Phase::Ready).then(|| self.global_index(&core))
    }

    /// Lookup a materialized record by its stable identifier.
    pub async fn lookup(&self, id: &RecordId) -> Option<Record> {
        self.core.lock().await.window.lookup(id).cloned()
    }

    /// Open the collection at a collection-global index.
    pub async fn initialize(&self, start_index: usize) -> Result<Anchor> {
        let mut core = self.core.lock().await;
        let start_page = (start_index / self.page_size) as u32 + 1;
        let local = start_index % self.page_size;
        tracing::debug!("Initializing at index {} (page {})", start_index, start_page);
        self.anchor_on_page(&mut core, start_page, local).await
    }

    /// Resume at the persisted position, if a checkpoint exists.
    pub async fn resume(&self) -> Result<Option<Anchor>> {
        match self.store.load().await? {
            Some(checkpoint) => {
                tracing::debug!(
                    "Resuming at index {} (page {})",
                    checkpoint.nav_index,
                    checkpoint.nav_page
                );
                Ok(Some(self.initialize(checkpoint.nav_index).await?))
            }
            None => Ok(None),
        }
    }

    pub async fn next(&self) -> Result<StepOutcome> {
        self.step(Direction::Forward).await
    }

    pub async fn previous(&self) -> Result<StepOutcome> {
        self.step(Direction::Backward).await
    }

    /// Move one record forward or backward.
    ///
    /// Fetches the target page on demand when the window does not cover
    /// it yet (the render waits for the page), then evaluates the
    /// prefetch margins. A failed fetch leaves the committed position,
    /// phase, and checkpoint untouched.
    pub async fn step(&self, direction: Direction) -> Result<StepOutcome> {
        let mut core = self.core.lock().await;
        match core.phase {
            Phase::Idle => return Err(NavError::NotInitialized),
            Phase::Exhausted => return Ok(StepOutcome::Boundary),
            Phase::Loading | Phase::Ready => {}
        }

        let prev = core.phase;
        core.phase = Phase::Loading;
        let result = self.step_inner(&mut core, direction).await;
        if !matches!(result, Ok(StepOutcome::Moved(_))) {
            core.phase = prev;
        }
        result
    }

    /// Rebuild the window around the current position.
    pub async fn rebuild(&self) -> Result<Anchor> {
        let mut core = self.core.lock().await;
        match core.phase {
            Phase::Idle => Err(NavError::NotInitialized),
            Phase::Exhausted => Ok(Anchor::Exhausted),
            Phase::Loading | Phase::Ready => {
                let around = core.index;
                self.rebuild_around(&mut core, around).await
            }
        }
    }

    /// Conversation thread of the current record, fetched lazily and
    /// cached; the windowed payload is enriched in place.
    pub async fn thread(&self) -> Result<ConversationThread> {
        let mut core = self.core.lock().await;
        let id = self.current_id(&core)?;
        if let Some(thread) = core.window.lookup(&id).and_then(|r| r.thread.clone()) {
            return Ok(thread);
        }

        let thread = self.threads.get_or_fetch(&*self.source, &id).await?;
        if let Some(record) = core.window.record_mut(&id) {
            record.thread = Some(thread.clone());
        }
        Ok(thread)
    }

    //
    // Internals. All callers hold the core lock.
    //

    async fn step_inner(&self, core: &mut NavCore, direction: Direction) -> Result<StepOutcome> {
        let target = match core.index.checked_add_signed(direction.delta()) {
            Some(target) => target,
            None => match self.extend_backward(core).await? {
                Some(added) => {
                    // The cursor's own position shifts with the prepend;
                    // the step target is the record just before it.
                    core.index = rebase_forward(core.index, added);
                    core.index - 1
                }
                None => return Ok(StepOutcome::Boundary),
            },
        };

        if target >= core.window.len() {
            // Next page not materialized; fetch before rendering.
            if !self.extend_forward(core).await? || target >= core.window.len() {
                return Ok(StepOutcome::Boundary);
            }
        }

        let target = self.apply_prefetch(core, target).await?;
        let record = self.commit(core, target).await?;
        Ok(StepOutcome::Moved(record))
    }

    /// Replace-load `page` and re-anchor at `local` within it, falling
    /// back to the backend's last page if the collection shrank below
    /// the requested page.
    async fn anchor_on_page(&self, core: &mut NavCore, page: u32, local: usize) -> Result<Anchor> {
        let prev = core.phase;
        core.phase = Phase::Loading;

        let mut page = page.max(1);
        if let Err(e) = core
            .window
            .load(&*self.source, page, LoadMode::Replace)
            .await
        {
            core.phase = prev;
            return Err(e);
        }
        if core.window.is_empty()
            && let Some(total) = core.window.total_pages().filter(|&t| t >= 1 && page > t)
        {
            page = total;
            if let Err(e) = core
                .window
                .load(&*self.source, page, LoadMode::Replace)
                .await
            {
                core.phase = prev;
                return Err(e);
            }
        }
        if core.window.is_empty() {
            core.phase = Phase::Exhausted;
            core.index = 0;
            self.clear_checkpoint().await;
            return Ok(Anchor::Exhausted);
        }

        let index = local.min(core.window.len() - 1);
        let index = match self.apply_prefetch(core, index).await {
            Ok(index) => index,
            Err(e) => {
                core.phase = prev;
                return Err(e);
            }
        };
        match self.commit(core, index).await {
            Ok(record) => Ok(Anchor::Current(record)),
            Err(e) => {
                core.phase = prev;
                Err(e)
            }
        }
    }

    /// Full, page-aligned reconstruction around a window-relative index.
    async fn rebuild_around(&self, core: &mut NavCore, around: usize) -> Result<Anchor> {
        let first = core.window.first_page().unwrap_or(1);
        let page = first + (around / self.page_size) as u32;
        let local = around % self.page_size;
        tracing::debug!("Rebuilding window around position {} (page {})", around, page);
        self.anchor_on_page(core, page, local).await
    }

    /// Evaluate the eager-load margins around `index`. Returns the
    /// index rebased past any prepend, exactly once, before the index
    /// is visible anywhere else.
    async fn apply_prefetch(&self, core: &mut NavCore, index: usize) -> Result<usize> {
        let local = index % self.page_size;

        if local >= self.page_size.saturating_sub(self.threshold) {
            let next = self.page_of(core, index) + 1;
            let next_exists = core.window.total_pages().is_some_and(|t| next <= t);
            if next_exists && !core.window.is_loaded(next) {
                tracing::debug!("Prefetching page {} ahead of position {}", next, index);
                core.window
                    .load(&*self.source, next, LoadMode::Append)
                    .await?;
            }
        }

        let mut index = index;
        if local < self.threshold {
            let owning = self.page_of(core, index);
            if owning > 1 && !core.window.is_loaded(owning - 1) {
                tracing::debug!("Prefetching page {} behind position {}", owning - 1, index);
                if let LoadStatus::Installed { added } = core
                    .window
                    .load(&*self.source, owning - 1, LoadMode::Prepend)
                    .await?
                {
                    index = rebase_forward(index, added);
                }
            }
        }

        Ok(index)
    }

    /// Load the page after the window, if the backend has one.
    /// Returns whether records were added.
    async fn extend_forward(&self, core: &mut NavCore) -> Result<bool> {
        let Some(last) = core.window.last_page() else {
            return Ok(false);
        };
        let next = last + 1;
        if !core.window.total_pages().is_some_and(|t| next <= t) {
            return Ok(false);
        }
        let status = core
            .window
            .load(&*self.source, next, LoadMode::Append)
            .await?;
        Ok(matches!(status, LoadStatus::Installed { added } if added > 0))
    }

    /// Load the page before the window, if one exists. Returns the
    /// number of records prepended.
    async fn extend_backward(&self, core: &mut NavCore) -> Result<Option<usize>> {
        let Some(first) = core.window.first_page() else {
            return Ok(None);
        };
        if first <= 1 {
            return Ok(None);
        }
        match core
            .window
            .load(&*self.source, first - 1, LoadMode::Prepend)
            .await?
        {
            LoadStatus::Installed { added } if added > 0 => Ok(Some(added)),
            _ => Ok(None),
        }
    }

    /// Commit a completed transition: flip the read flag, advance the
    /// index, persist the checkpoint, and hand back the rendered record.
    async fn commit(&self, core: &mut NavCore, index: usize) -> Result<Record> {
        let id = core
            .window
            .id_at(index)
            .cloned()
            .ok_or(NavError::PositionNotMaterialized(index))?;

        let mut newly_read = false;
        let record = {
            let record = core
                .window
                .record_mut(&id)
                .ok_or(NavError::PositionNotMaterialized(index))?;
            if self.mark_read_on_open && !record.is_seen() {
                record.flags.insert(RecordFlags::SEEN);
                newly_read = true;
            }
            record.clone()
        };

        core.index = index;
        core.phase = Phase::Ready;
        self.persist(core).await;

        if newly_read {
            self.spawn_mark_read(id);
        }

        Ok(record)
    }

    /// Write the navigation checkpoint. Advisory: a failed write is
    /// logged and never rolls back the committed transition.
    async fn persist(&self, core: &NavCore) {
        let global = self.global_index(core);
        let checkpoint = NavCheckpoint {
            nav_ids: core.window.ids().to_vec(),
            nav_index: global,
            nav_page: (global / self.page_size) as u32 + 1,
        };
        if let Err(e) = self.store.save(&checkpoint).await {
            tracing::warn!("Failed to persist navigation state: {}", e);
        }
    }

    async fn clear_checkpoint(&self) {
        if let Err(e) = self.store.clear().await {
            tracing::warn!("Failed to clear navigation state: {}", e);
        }
    }

    /// Mark-read is fire-and-forget: it must never block or reorder
    /// navigation, and unlike page loads it is safe to retry.
    fn spawn_mark_read(&self, id: RecordId) {
        let source = Arc::clone(&self.source);
        let retry = self.retry.clone();
        tokio::spawn(async move {
            let result = with_backoff(&retry, || {
                let source = Arc::clone(&source);
                let id = id.clone();
                async move { source.mark_read(&id).await }
            })
            .await;
            if let Err(e) = result {
                tracing::warn!("Failed to mark {} read: {}", id, e);
            }
        });
    }

    fn current_id(&self, core: &NavCore) -> Result<RecordId> {
        if core.phase == Phase::Idle {
            return Err(NavError::NotInitialized);
        }
        core.window
            .id_at(core.index)
            .cloned()
            .ok_or(NavError::PositionNotMaterialized(core.index))
    }

    /// 1-based backend page owning a window-relative index.
    fn page_of(&self, core: &NavCore, index: usize) -> u32 {
        core.window.first_page().unwrap_or(1) + (index / self.page_size) as u32
    }

    /// Collection-global index of a window-relative position.
    fn global_index(&self, core: &NavCore) -> usize {
        let first = core.window.first_page().unwrap_or(1) as usize;
        (first - 1) * self.page_size + core.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use crate::testsupport::{FakeBackend, navigator_with, test_config};

    #[tokio::test]
    async fn test_cold_start_prefetches_forward_margin() {
        let (backend, _store, nav) = navigator_with(100, 20, 5);

        let anchor = nav.initialize(18).await.unwrap();
        let record = anchor.into_record().unwrap();
        assert_eq!(record.id.as_str(), "r18");

        let core = nav.core.lock().await;
        assert_eq!(core.window.len(), 40);
        assert_eq!(
            core.window.loaded_pages().iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(core.index, 18);
        assert_eq!(core.phase, Phase::Ready);
        assert_eq!(backend.fetches(), 2);
    }

    #[tokio::test]
    async fn test_initialize_in_page_interior_loads_single_page() {
        let (backend, _store, nav) = navigator_with(100, 20, 5);

        let record = nav.initialize(45).await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r45");
        assert_eq!(backend.fetches(), 1);

        let core = nav.core.lock().await;
        assert_eq!(core.window.len(), 20);
        assert_eq!(core.window.first_page(), Some(3));
        assert_eq!(core.index, 5);
    }

    #[tokio::test]
    async fn test_initialize_near_page_start_prepends_and_rebases() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);

        let record = nav.initialize(42).await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r42");
        assert_eq!(nav.position().await, Some(42));

        let core = nav.core.lock().await;
        assert_eq!(
            core.window.loaded_pages().iter().copied().collect::<Vec<_>>(),
            vec![2, 3]
        );
        // Index was rebased past the prepended page
        assert_eq!(core.index, 22);
    }

    #[tokio::test]
    async fn test_rebase_shift_preserves_identity() {
        // Window of three pages; a prepend must shift every tracked
        // position by exactly one page of records and keep each position
        // on the same identifier.
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(45).await.unwrap();

        let mut core = nav.core.lock().await;
        core.window
            .load(&*nav.source, 4, LoadMode::Append)
            .await
            .unwrap();
        core.window
            .load(&*nav.source, 2, LoadMode::Prepend)
            .await
            .unwrap();
        assert_eq!(core.window.len(), 60);

        let at_2 = core.window.id_at(2).cloned().unwrap();
        let at_22 = core.window.id_at(22).cloned().unwrap();

        // Cursor two records into the window's first page: the margin
        // prepends the page before and rebases the cursor past it.
        let rebased = nav.apply_prefetch(&mut core, 2).await.unwrap();
        assert_eq!(rebased, 22);
        assert_eq!(core.window.len(), 80);
        assert_eq!(core.window.id_at(22), Some(&at_2));
        assert_eq!(core.window.id_at(42), Some(&at_22));
    }

    #[tokio::test]
    async fn test_backward_boundary_is_noop() {
        let (backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(0).await.unwrap();
        let fetches = backend.fetches();

        let outcome = nav.previous().await.unwrap();
        assert!(outcome.is_boundary());
        assert_eq!(backend.fetches(), fetches);

        let core = nav.core.lock().await;
        assert_eq!(core.index, 0);
        assert_eq!(core.phase, Phase::Ready);
    }

    #[tokio::test]
    async fn test_forward_boundary_at_collection_end() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(99).await.unwrap();

        let outcome = nav.next().await.unwrap();
        assert!(outcome.is_boundary());
        assert_eq!(nav.position().await, Some(99));
    }

    #[tokio::test]
    async fn test_step_forward_prefetches_at_threshold() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(10).await.unwrap();

        for expected in 11..=15 {
            let record = nav.next().await.unwrap().into_record().unwrap();
            assert_eq!(record.id.as_str(), format!("r{}", expected));
        }

        let core = nav.core.lock().await;
        // Position 15 is five short of the page boundary, so page 2 is in
        assert_eq!(core.window.len(), 40);
        assert!(core.window.is_loaded(2));
        assert_eq!(core.index, 15);
    }

    #[tokio::test]
    async fn test_step_back_prefetches_and_rebases() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(45).await.unwrap();

        let record = nav.previous().await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r44");
        assert_eq!(nav.position().await, Some(44));

        let core = nav.core.lock().await;
        assert!(core.window.is_loaded(2));
        assert_eq!(core.index, 24);
    }

    #[tokio::test]
    async fn test_on_demand_append_at_window_edge() {
        // Prefetch disabled: the step itself must fetch the next page
        let (backend, _store, nav) = navigator_with(100, 20, 0);
        nav.initialize(19).await.unwrap();
        assert_eq!(backend.fetches(), 1);

        let record = nav.next().await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r20");
        assert_eq!(backend.fetches(), 2);

        let core = nav.core.lock().await;
        assert_eq!(core.window.len(), 40);
        assert_eq!(core.index, 20);
    }

    #[tokio::test]
    async fn test_on_demand_prepend_at_window_start() {
        let (backend, _store, nav) = navigator_with(100, 20, 0);
        nav.initialize(40).await.unwrap();
        assert_eq!(backend.fetches(), 1);

        let record = nav.previous().await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r39");
        assert_eq!(nav.position().await, Some(39));

        let core = nav.core.lock().await;
        assert_eq!(core.window.first_page(), Some(2));
        assert_eq!(core.index, 19);
    }

    #[tokio::test]
    async fn test_fetch_failure_rolls_back_step() {
        let (backend, store, nav) = navigator_with(100, 20, 5);
        nav.initialize(10).await.unwrap();
        for _ in 0..4 {
            nav.next().await.unwrap();
        }
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.nav_index, 14);

        backend.fail_page(2);
        let err = nav.next().await.unwrap_err();
        assert!(err.is_fetch_failure());

        // The attempted transition was rolled back to a no-op
        assert_eq!(nav.position().await, Some(14));
        assert_eq!(nav.phase().await, Phase::Ready);
        assert_eq!(store.load().await.unwrap().unwrap().nav_index, 14);

        // Once the backend recovers, the same step succeeds
        backend.clear_failures();
        let record = nav.next().await.unwrap().into_record().unwrap();
        assert_eq!(record.id.as_str(), "r15");
    }

    #[tokio::test]
    async fn test_step_before_initialize_errors() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        assert!(matches!(
            nav.next().await.unwrap_err(),
            NavError::NotInitialized
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_written_after_each_commit() {
        let (_backend, store, nav) = navigator_with(100, 20, 5);
        nav.initialize(18).await.unwrap();

        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.nav_index, 18);
        assert_eq!(saved.nav_page, 1);
        assert_eq!(saved.nav_ids.len(), 40);

        nav.next().await.unwrap();
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.nav_index, 19);
        assert_eq!(saved.nav_page, 1);
    }

    #[tokio::test]
    async fn test_resume_restores_position() {
        let backend = Arc::new(FakeBackend::with_records(100, 20));
        let store = Arc::new(InMemorySessionStore::new());
        let config = test_config(20, 5);

        let nav = Navigator::new(backend.clone(), store.clone(), &config);
        nav.initialize(37).await.unwrap();
        drop(nav);

        let nav = Navigator::new(backend, store, &config);
        let anchor = nav.resume().await.unwrap().unwrap();
        assert_eq!(anchor.into_record().unwrap().id.as_str(), "r37");
        assert_eq!(nav.position().await, Some(37));
    }

    #[tokio::test]
    async fn test_resume_without_checkpoint() {
        let (_backend, _store, nav) = navigator_with(100, 20, 5);
        assert!(nav.resume().await.unwrap().is_none());
        assert_eq!(nav.phase().await, Phase::Idle);
    }

    #[tokio::test]
    async fn test_empty_collection_is_exhausted() {
        let (_backend, store, nav) = navigator_with(0, 20, 5);

        let anchor = nav.initialize(0).await.unwrap();
        assert!(anchor.is_exhausted());
        assert_eq!(nav.phase().await, Phase::Exhausted);
        assert!(store.load().await.unwrap().is_none());

        assert!(nav.next().await.unwrap().is_boundary());
        assert!(nav.current().await.is_none());
    }

    #[tokio::test]
    async fn test_mark_read_fired_on_landing() {
        let (backend, _store, nav) = navigator_with(100, 20, 5);
        let record = nav.initialize(3).await.unwrap().into_record().unwrap();
        assert!(record.is_seen());

        // The send is spawned; give it a chance to run
        for _ in 0..100 {
            if backend.mark_read_count.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(
            backend.mark_read_count.load(std::sync::atomic::Ordering::SeqCst),
            1
        );

        // The window copy carries the flipped flag too
        assert!(nav.current().await.unwrap().is_seen());
    }

    #[tokio::test]
    async fn test_thread_is_fetched_lazily_and_cached() {
        let (_backend, _store, nav) = navigator_with(10, 20, 5);
        nav.initialize(2).await.unwrap();

        assert!(nav.current().await.unwrap().thread.is_none());
        let thread = nav.thread().await.unwrap();
        assert_eq!(thread.messages.len(), 1);

        // Payload enriched in place
        assert!(nav.current().await.unwrap().thread.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_steps_serialize() {
        let backend = Arc::new(FakeBackend::with_records(100, 20));
        let store = Arc::new(InMemorySessionStore::new());
        let config = test_config(20, 5);
        let nav = Arc::new(Navigator::new(backend, store, &config));
        nav.initialize(10).await.unwrap();

        let a = Arc::clone(&nav);
        let b = Arc::clone(&nav);
        let (ra, rb) = tokio::join!(a.next(), b.next());
        ra.unwrap();
        rb.unwrap();

        assert_eq!(nav.position().await, Some(12));
    }

    #[tokio::test]
    async fn test_rebuild_restores_current_record() {
        let (backend, _store, nav) = navigator_with(100, 20, 5);
        nav.initialize(18).await.unwrap();
        let before = backend.fetches();

        let anchor = nav.rebuild().await.unwrap();
        assert_eq!(anchor.into_record().unwrap().id.as_str(), "r18");
        assert_eq!(nav.position().await, Some(18));
        // Replace plus the forward prefetch
        assert_eq!(backend.fetches(), before + 2);
    }
}
