//! Mutation coordination: delete and reply-and-close.
//!
//! Both actions remove the current record from the active set. The
//! window is spliced at the current position (later positions shift
//! down by one, the opposite direction of a prepend shift) and then
//! fully rebuilt around the survivor, restoring the page-aligned
//! invariant. The window is only ever misaligned inside a single
//! coordinator call, never between public calls.

use crate::error::{NavError, Result};
use crate::records::{RecordId, ReplyDraft};

use super::{Anchor, NavCore, Navigator, Phase};

impl Navigator {
    /// Delete the current record and re-anchor on its successor.
    pub async fn delete_current(&self) -> Result<Anchor> {
        let mut core = self.core.lock().await;
        if core.phase == Phase::Exhausted {
            return Ok(Anchor::Exhausted);
        }
        let id = self.current_id(&core)?;

        self.source.delete(&id).await?;
        tracing::debug!("Deleted record {}", id);
        self.remove_current(&mut core, id).await
    }

    /// Send a reply and close the current record, removing it from the
    /// active set exactly like a delete.
    pub async fn reply_and_close(&self, draft: ReplyDraft) -> Result<Anchor> {
        let mut core = self.core.lock().await;
        if core.phase == Phase::Exhausted {
            return Ok(Anchor::Exhausted);
        }
        let id = self.current_id(&core)?;

        self.source.reply_and_close(&id, &draft).await?;
        tracing::debug!("Replied to and closed record {}", id);
        self.remove_current(&mut core, id).await
    }

    /// Notification that the record at the current position was removed
    /// by a mutation performed elsewhere. The identifier must match the
    /// current record; anything else means the caller's view is stale.
    pub async fn on_record_removed(&self, id: &RecordId) -> Result<Anchor> {
        let mut core = self.core.lock().await;
        if core.phase == Phase::Exhausted {
            return Ok(Anchor::Exhausted);
        }
        let current = self.current_id(&core)?;
        if &current != id {
            return Err(NavError::NotMaterialized(id.clone()));
        }
        self.remove_current(&mut core, current).await
    }

    /// Splice the current record out of the window, then rebuild.
    ///
    /// If the rebuild's page fetch fails the splice is kept (the
    /// backend mutation already happened) and the error is surfaced;
    /// the window stays navigable and a later `rebuild` restores
    /// alignment.
    async fn remove_current(&self, core: &mut NavCore, id: RecordId) -> Result<Anchor> {
        core.window.splice_remove(core.index);
        self.threads.invalidate(&id).await;

        if core.window.is_empty() {
            core.phase = Phase::Exhausted;
            core.index = 0;
            self.clear_checkpoint().await;
            tracing::debug!("Collection exhausted after removing {}", id);
            return Ok(Anchor::Exhausted);
        }

        if core.index >= core.window.len() {
            core.index -= 1;
        }
        let around = core.index;
        self.rebuild_around(core, around).await
    }
}
