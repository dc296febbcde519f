use crate::parse::ParsedPage;
use chrono::Utc;
use sitescan_types::{FetchMode, PageCrawlResult, UrlKey};

/// Fetch-level metadata a backend pairs with a parsed document.
#[derive(Debug, Clone)]
pub struct FetchMeta {
    pub url: UrlKey,
    pub final_url: String,
    pub http_status: Option<u16>,
    pub fetch_mode: FetchMode,
    pub duration_ms: u64,
    pub bytes_downloaded: u64,
    pub hsts_header_present: bool,
    pub tls_valid: bool,
    pub js_heavy: bool,
}

/// Assemble the uniform crawl result both backends return.
pub fn to_crawl_result(parsed: ParsedPage, meta: FetchMeta) -> PageCrawlResult {
    let scheme = meta
        .final_url
        .split("://")
        .next()
        .unwrap_or("http")
        .to_ascii_lowercase();
    PageCrawlResult {
        url: meta.url,
        final_url: meta.final_url,
        http_status: meta.http_status,
        fetched_at: Utc::now(),
        fetch_mode: meta.fetch_mode,
        duration_ms: meta.duration_ms,
        bytes_downloaded: meta.bytes_downloaded,
        title: parsed.title,
        h1: parsed.h1,
        h2: parsed.h2,
        h3: parsed.h3,
        h4: parsed.h4,
        h5: parsed.h5,
        h6: parsed.h6,
        meta_description: parsed.meta_description,
        canonical: parsed.canonical,
        robots_directives: parsed.robots_directives,
        lang: parsed.lang,
        viewport: parsed.viewport,
        internal_links: parsed.internal_links,
        external_links: parsed.external_links,
        images: parsed.images,
        visible_text: parsed.visible_text,
        word_count: parsed.word_count,
        json_ld_types: parsed.json_ld_types,
        forms_count: parsed.forms_count,
        form_input_count: parsed.form_input_count,
        scheme,
        hsts_header_present: meta.hsts_header_present,
        tls_valid: meta.tls_valid,
        js_heavy: meta.js_heavy,
        fetch_error: None,
    }
}
