use crate::error::FetchError;
use crate::url_key::UrlKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which backend produced a crawl result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchMode {
    Http,
    Headless,
}

/// Priority band for a page. Drives both fetch strategy and score weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    T1,
    T2,
    T3,
}

impl Tier {
    /// Scoring weight: T1 pages count three times as much as T3 pages.
    pub fn weight(self) -> u32 {
        match self {
            Tier::T1 => 3,
            Tier::T2 => 2,
            Tier::T3 => 1,
        }
    }

    /// Dequeue rank, lower first.
    pub fn rank(self) -> u8 {
        match self {
            Tier::T1 => 0,
            Tier::T2 => 1,
            Tier::T3 => 2,
        }
    }
}

/// Functional role of a page, derived from its URL slug independently of tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Home,
    Service,
    Location,
    ServiceArea,
    Contact,
    About,
    Blog,
    Legal,
    Other,
}

/// A hyperlink extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub href: String,
    pub anchor_text: String,
    pub rel_attrs: Vec<String>,
}

/// An image reference extracted from a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub loading_attr: Option<String>,
}

/// Immutable snapshot of one fetch.
///
/// If `fetch_error` is set, all parsed fields are empty and `word_count` is
/// zero; rules must tolerate that shape and emit `NotApplicable` where they
/// need parsed data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCrawlResult {
    pub url: UrlKey,
    pub final_url: String,
    pub http_status: Option<u16>,
    pub fetched_at: DateTime<Utc>,
    pub fetch_mode: FetchMode,
    pub duration_ms: u64,
    pub bytes_downloaded: u64,

    // Parsed head and structural signals
    pub title: Option<String>,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub h4: Vec<String>,
    pub h5: Vec<String>,
    pub h6: Vec<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub robots_directives: Vec<String>,
    pub lang: Option<String>,
    pub viewport: Option<String>,

    // Links and media
    pub internal_links: Vec<PageLink>,
    pub external_links: Vec<PageLink>,
    pub images: Vec<PageImage>,

    // Text
    pub visible_text: String,
    pub word_count: usize,

    // Structure signals the rules consume
    /// `@type` values found in JSON-LD blocks.
    pub json_ld_types: Vec<String>,
    pub forms_count: usize,
    pub form_input_count: usize,

    // Security
    pub scheme: String,
    pub hsts_header_present: bool,
    pub tls_valid: bool,

    // Rendering
    pub js_heavy: bool,

    pub fetch_error: Option<FetchError>,
}

impl PageCrawlResult {
    /// A result with no parsed content, carrying only the failure.
    pub fn failed(url: UrlKey, mode: FetchMode, error: FetchError) -> Self {
        let scheme = url
            .as_str()
            .split("://")
            .next()
            .unwrap_or("http")
            .to_string();
        Self {
            final_url: url.as_str().to_string(),
            url,
            http_status: None,
            fetched_at: Utc::now(),
            fetch_mode: mode,
            duration_ms: 0,
            bytes_downloaded: 0,
            title: None,
            h1: Vec::new(),
            h2: Vec::new(),
            h3: Vec::new(),
            h4: Vec::new(),
            h5: Vec::new(),
            h6: Vec::new(),
            meta_description: None,
            canonical: None,
            robots_directives: Vec::new(),
            lang: None,
            viewport: None,
            internal_links: Vec::new(),
            external_links: Vec::new(),
            images: Vec::new(),
            visible_text: String::new(),
            word_count: 0,
            json_ld_types: Vec::new(),
            forms_count: 0,
            form_input_count: 0,
            scheme,
            hsts_header_present: false,
            tls_valid: false,
            js_heavy: false,
            fetch_error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.fetch_error.is_none()
    }
}

/// A crawled page with its classification attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub crawl: PageCrawlResult,
    pub tier: Tier,
    pub page_type: PageType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_weights_and_ranks() {
        assert_eq!(Tier::T1.weight(), 3);
        assert_eq!(Tier::T2.weight(), 2);
        assert_eq!(Tier::T3.weight(), 1);
        assert!(Tier::T1.rank() < Tier::T3.rank());
    }

    #[test]
    fn failed_result_has_empty_parsed_fields() {
        let key = UrlKey::parse("https://example.com/x").expect("valid URL");
        let result = PageCrawlResult::failed(key, FetchMode::Http, FetchError::Timeout);
        assert_eq!(result.word_count, 0);
        assert!(result.title.is_none());
        assert!(result.h1.is_empty());
        assert_eq!(result.scheme, "https");
        assert_eq!(result.fetch_error, Some(FetchError::Timeout));
    }
}
