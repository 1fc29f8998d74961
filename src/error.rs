//! Error types for the frontier queue.
//!
//! Store failures and configuration mistakes are typed so callers can branch
//! on kind; everything else crosses into application code as `anyhow::Error`
//! at the edges (CLI, dashboard-style integrations), matching how the rest of
//! this codebase layers `thiserror` under `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    /// The underlying Redis-compatible store returned an error or the
    /// connection could not be established. The queue never retries these;
    /// callers may retry the whole operation.
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    /// An encoded request could not be decoded (corrupted member). The
    /// offending member is dropped by the caller, not retried.
    #[error("corrupt encoded request: {0}")]
    Decode(String),

    /// A configuration value was out of range or internally inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FrontierError>;
