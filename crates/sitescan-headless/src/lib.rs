//! # SiteScan Headless
//!
//! Headless fetch backend over a managed pool of browser contexts.
//!
//! Tier-1 pages with weak static content (and tier-2 pages flagged as
//! js-heavy) are re-fetched here so that client-side rendering cannot hide
//! content from the audit. The pool bounds simultaneous contexts with a
//! semaphore; every failure mode is folded into a `PageCrawlResult` with
//! `fetch_error = Other` rather than surfaced as an error.

pub mod backend;
pub mod pool;

pub use backend::{HeadlessConfig, HeadlessFetcher};
pub use pool::{BrowserCheckout, BrowserPool, BrowserPoolConfig, PoolStats};
