use crate::context::SiteContext;
use crate::rule::Rule;
use sitescan_types::{AuditFactor, Evidence, FactorCategory, Importance, PageRecord, Verdict};

/// Transfer size above which a page is flagged heavy.
const HEAVY_PAGE_BYTES: u64 = 2 * 1024 * 1024;
/// Image count above which lazy loading is expected.
const LAZY_LOAD_RELEVANT_IMAGES: usize = 5;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ViewportMissing),
        Box::new(PageWeightHeavy),
        Box::new(ScriptBloat),
        Box::new(LazyLoadingMissing),
        Box::new(MixedContentOnForm),
    ]
}

struct ViewportMissing;

impl Rule for ViewportMissing {
    fn id(&self) -> &'static str {
        "ux.viewport.missing"
    }
    fn name(&self) -> &'static str {
        "Mobile viewport configured"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::UxPerformance
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn critical(&self) -> bool {
        true
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let present = page.crawl.viewport.is_some();
        let verdict = if present { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(
            page,
            Evidence::new().set("viewport_present", present),
            verdict,
        )]
    }
}

struct PageWeightHeavy;

impl Rule for PageWeightHeavy {
    fn id(&self) -> &'static str {
        "ux.page_weight.heavy"
    }
    fn name(&self) -> &'static str {
        "Page weight reasonable"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::UxPerformance
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let bytes = page.crawl.bytes_downloaded;
        let verdict = if bytes > HEAVY_PAGE_BYTES {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("bytes_downloaded", bytes)
                .set("threshold", HEAVY_PAGE_BYTES),
            verdict,
        )]
    }
}

/// Static HTML that demands script execution to show content slows first
/// paint and hides content from non-executing agents.
struct ScriptBloat;

impl Rule for ScriptBloat {
    fn id(&self) -> &'static str {
        "ux.scripts.bloat"
    }
    fn name(&self) -> &'static str {
        "Content not script-gated"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::UxPerformance
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let verdict = if page.crawl.js_heavy {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new().set("js_heavy", page.crawl.js_heavy),
            verdict,
        )]
    }
}

struct LazyLoadingMissing;

impl Rule for LazyLoadingMissing {
    fn id(&self) -> &'static str {
        "ux.img.lazy_loading.missing"
    }
    fn name(&self) -> &'static str {
        "Images lazy-loaded"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::UxPerformance
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let total = page.crawl.images.len();
        if total <= LAZY_LOAD_RELEVANT_IMAGES {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let lazy = page
            .crawl
            .images
            .iter()
            .filter(|img| img.loading_attr.as_deref() == Some("lazy"))
            .count();
        let verdict = if lazy == 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("images_total", total as u64)
                .set("images_lazy", lazy as u64),
            verdict,
        )]
    }
}

/// Mixed content on a page with a form undermines the form's transport
/// security and triggers browser warnings at submit time.
struct MixedContentOnForm;

impl Rule for MixedContentOnForm {
    fn id(&self) -> &'static str {
        "security.mixed_content.form"
    }
    fn name(&self) -> &'static str {
        "No mixed content on form pages"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::UxPerformance
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some()
            || page.crawl.scheme != "https"
            || page.crawl.forms_count == 0
        {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let insecure = page
            .crawl
            .images
            .iter()
            .filter(|img| img.src.starts_with("http://"))
            .count();
        let verdict = if insecure > 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("insecure_resources", insecure as u64)
                .set("forms_count", page.crawl.forms_count as u64),
            verdict,
        )]
    }
}
