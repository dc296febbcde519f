//! # SiteScan HTML
//!
//! Parses a fetched HTML body into the structural signals the audit rules
//! consume: head metadata, heading outline, link and image inventories,
//! whitespace-normalized visible text, and the script statistics that feed
//! the `js_heavy` decision.

mod compose;
mod parse;

pub use compose::{to_crawl_result, FetchMeta};
pub use parse::{parse_page, ParsedPage};
