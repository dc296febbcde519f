//! # SiteScan Fetch
//!
//! HTTP/network layer for the SiteScan audit engine:
//!
//! - **Http backend**: size-capped, charset-aware GET with redirect policy
//!   enforcement and retry/backoff, returning a uniform `PageCrawlResult`
//! - **Robots manager**: RFC 9309 compliance with a per-host cache,
//!   crawl-delay extraction, and sitemap directive discovery
//! - **Politeness gate**: per-origin concurrency cap and minimum spacing
//!   between request starts

pub mod http;
pub mod politeness;
pub mod robots;

pub use http::{FetchConfig, HttpFetcher, RetryConfig};
pub use politeness::HostPoliteness;
pub use robots::{RobotsConfig, RobotsManager, RobotsSnapshot};
