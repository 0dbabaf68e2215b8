//! Error types for the AI client and the persistent store.

use thiserror::Error;

/// Errors surfaced by the generative API client.
///
/// Remote failures keep their kind all the way up to the caller: only
/// retries are handled internally, so the UI can distinguish "add an API
/// key" from "high traffic, try later".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AiError {
    /// No API key configured. Fails fast, never retried; callers are
    /// expected to fall back to manual entry.
    #[error("generative API key is not configured")]
    NotConfigured,

    /// The service rejected the call for quota reasons. Retryable.
    #[error("rate limited by the generative API: {0}")]
    RateLimited(String),

    /// A rate-limited call failed through the whole retry budget.
    #[error("gave up after {attempts} rate-limited retries")]
    Exhausted { attempts: u32 },

    /// Any other remote failure. Terminal, propagated as-is.
    #[error("generative API call failed: {0}")]
    Remote(String),

    /// The service answered but the payload was not usable.
    #[error("malformed response from the generative API: {0}")]
    InvalidResponse(String),

    /// The caller cancelled while waiting to issue the next call.
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from the key-value backing store.
///
/// These never abort a user action: the store swallows them into a
/// [`WriteStatus`](crate::store::WriteStatus) warning at its boundary.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing store is out of space. The in-memory state is kept.
    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("failed to serialize collection: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}
