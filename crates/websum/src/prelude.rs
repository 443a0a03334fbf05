//! Convenience re-exports for common `websum` types.
//!
//! ```ignore
//! use websum::prelude::*;
//! ```
//!
//! Covers building a [`Controller`] from a [`Config`] and handling its
//! results. Budget internals (fit attempts, safety margin) stay in
//! [`context::budget`](crate::context::budget).

// ── Configuration ───────────────────────────────────────────────────
pub use crate::config::Config;

// ── Orchestration ───────────────────────────────────────────────────
pub use crate::controller::{Controller, Outcome, Processed};

// ── Seams ───────────────────────────────────────────────────────────
pub use crate::context::{Cl100kTokenizer, TokenCounter, Truncation};
pub use crate::fetch::{FetchFuture, FetchedPage, Fetcher, HttpFetcher};

// ── Errors ──────────────────────────────────────────────────────────
pub use crate::error::{ConfigError, Stage, WebsumError};
