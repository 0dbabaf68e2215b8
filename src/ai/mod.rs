//! AI orchestration: a resilient client over a generative provider.
//!
//! The provider trait is the seam for swapping model backends; the
//! retry executor and client layer rate-limit handling, pacing, and
//! cancellation on top of it.

pub mod backoff;
pub mod client;
pub mod provider;
pub mod retry;

pub use client::AiClient;
pub use provider::{GeminiProvider, GenerativeProvider};
pub use retry::{RetryExecutor, Sleep, TokioSleep};
