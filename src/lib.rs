//! Wardrobe: local-first wardrobe cataloguing with AI assistance.
//!
//! The crate has three layers:
//!
//! - [`store`]: an identity-scoped persistent collection store over a
//!   key-value backend. Writes apply in memory first and persistence is
//!   best effort, so quota exhaustion degrades to a session-only store
//!   instead of failing mutations.
//! - [`ai`]: a resilient client for a generative model provider, with
//!   rate-limit-aware retries, paced multi-view image generation, and
//!   cooperative cancellation.
//! - [`session`]: the controller that binds an identity to its store
//!   scope and persists the session across restarts.

pub mod ai;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod session;
pub mod store;

pub use ai::AiClient;
pub use config::Config;
pub use error::{AiError, StorageError};
pub use session::SessionController;
pub use store::{ScopeKey, WardrobeStore, WriteStatus};
