//! Error taxonomy for the navigator and its backend client.

use crate::records::RecordId;

/// Errors surfaced by navigation, page loading, and mutation calls.
///
/// A fetch failure never commits a partial transition: the navigator's
/// index, phase, and persisted checkpoint are left exactly as they were
/// before the failed call.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    /// The backend request could not be completed (network, TLS, timeout).
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status} for {endpoint}: {detail}")]
    Status {
        status: reqwest::StatusCode,
        endpoint: String,
        detail: String,
    },

    /// A render or mutation referenced an identifier that is not present
    /// in the materialized window. Stale index after an out-of-band
    /// mutation; reported, never retried.
    #[error("record {0} is not materialized in the window")]
    NotMaterialized(RecordId),

    /// A committed window position no longer holds a record.
    #[error("no record materialized at window position {0}")]
    PositionNotMaterialized(usize),

    /// `step`/`rebuild` was called before `initialize`.
    #[error("navigator has not been initialized")]
    NotInitialized,

    /// A page load would leave a gap in the window. The navigator only
    /// ever requests pages adjacent to the loaded run; anything else is
    /// a logic error in the caller.
    #[error("page {page} is not adjacent to the loaded window")]
    NonAdjacentPage { page: u32 },

    /// The session store rejected a checkpoint read.
    #[error("session store failed: {0}")]
    Store(#[source] anyhow::Error),
}

impl NavError {
    /// Whether this error came from the backend rather than local logic.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, NavError::Http(_) | NavError::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
