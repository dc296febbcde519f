//! # SiteScan Types
//!
//! Shared data model for the SiteScan audit engine:
//!
//! - **URL keys**: normalized page identity used for frontier deduplication
//! - **Crawl results**: the immutable snapshot a fetch backend produces
//! - **Audit factors**: the unit of analysis output, with evidence bags
//! - **Reports**: the aggregate a finished run hands to persistence
//!
//! Every other crate in the workspace depends on this one; it depends on
//! nothing but serialization and time.

pub mod error;
pub mod factor;
pub mod page;
pub mod report;
pub mod url_key;

pub use error::FetchError;
pub use factor::{AuditFactor, Evidence, FactorCategory, FactorStatus, Importance, Verdict};
pub use page::{
    FetchMode, PageCrawlResult, PageImage, PageLink, PageRecord, PageType, Tier,
};
pub use report::{AuditReport, AuditStatus, AuditSummary};
pub use url_key::UrlKey;
