//! # SiteScan Spider
//!
//! The crawl orchestrator and its supporting parts:
//!
//! - **Page classifier**: deterministic tiering of URLs into the three
//!   priority bands that drive fetch policy and score weighting
//! - **Sitemap discovery**: sitemap.xml and robots.txt directive walking
//! - **Frontier**: the deduplicating priority queue the workers consume
//! - **Budget manager**: page-count and wall-clock limits with
//!   tier-3-first dropping
//! - **Orchestrator**: the worker pool tying fetch backends, politeness,
//!   classification, and discovery into one run

pub mod budget;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod frontier;
pub mod orchestrator;
pub mod sitemap;

pub use budget::{BudgetConfig, BudgetManager};
pub use cancel::CancelFlag;
pub use classify::{ClassifierConfig, PageClassifier};
pub use config::CrawlConfig;
pub use frontier::{Frontier, FrontierEntry};
pub use orchestrator::{CrawlOutcome, CrawlStats, Crawler, RunPhase};
pub use sitemap::{SitemapCrawler, SitemapEntry};
