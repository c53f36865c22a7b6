//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Number of records per backend page.
/// Fixed for the lifetime of a session; agreed out-of-band with the API.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Distance (in records) from a page boundary at which the neighboring
/// page is loaded eagerly. Keeps a margin of already-materialized
/// records on both sides of the cursor so a step rarely blocks on I/O.
pub const DEFAULT_PREFETCH_THRESHOLD: usize = 5;

/// Request timeout in seconds for backend calls.
/// A stalled page fetch fails the pending step instead of hanging it.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum number of conversation threads held in the hot cache.
pub const THREAD_CACHE_MAX_CAPACITY: u64 = 200;

/// Conversation thread cache TTL in seconds.
/// Threads only grow at the tail; half an hour of staleness is acceptable.
pub const THREAD_CACHE_TTL_SECS: u64 = 1800;

/// Maximum retry attempts for mark-read sends.
/// Page loads are never retried; mark-read is order-independent.
pub const MARK_READ_MAX_RETRIES: u32 = 3;

/// Initial delay in milliseconds before the first mark-read retry.
pub const MARK_READ_RETRY_DELAY_MS: u64 = 500;

/// Maximum delay in seconds between mark-read retries.
pub const MARK_READ_MAX_RETRY_DELAY_SECS: u64 = 30;

/// File name of the persisted navigation checkpoint in the data dir.
pub const SESSION_FILE_NAME: &str = "session.json";
