//! # SiteScan Audit
//!
//! The analysis half of the engine:
//!
//! - **Rule catalog**: independent, side-effect-free checks over crawled
//!   pages, each emitting evidence-backed factors
//! - **Site context**: the shared knowledge rules may consult (NAP
//!   extractions, sitemap presence, site-wide duplicates)
//! - **OFI classification engine**: the four-criteria matrix deciding which
//!   deficiencies escalate to Priority OFI
//! - **Aggregator & scorer**: tier-weighted category scores and the overall
//!   weighted score

pub mod aggregate;
pub mod catalog;
pub mod context;
pub mod engine;
pub mod ofi;
pub mod rule;
pub mod rules;

pub use aggregate::Aggregator;
pub use catalog::RuleCatalog;
pub use context::SiteContext;
pub use engine::AuditEngine;
pub use ofi::OfiClassifier;
pub use rule::Rule;
