use crate::context::SiteContext;
use crate::rule::Rule;
use sitescan_types::{
    AuditFactor, Evidence, FactorCategory, FetchError, Importance, PageRecord, Verdict,
};

const TITLE_MIN: usize = 10;
const TITLE_MAX: usize = 60;
const DESCRIPTION_MIN: usize = 50;
const DESCRIPTION_MAX: usize = 160;

pub fn rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(Availability),
        Box::new(TitleMissing),
        Box::new(TitleLength),
        Box::new(MetaDescriptionMissing),
        Box::new(MetaDescriptionLength),
        Box::new(H1Missing),
        Box::new(H1Multiple),
        Box::new(HeadingStructure),
        Box::new(CanonicalMissing),
        Box::new(RobotsNoindex),
        Box::new(LangMissing),
        Box::new(HttpsMissing),
        Box::new(TlsInvalid),
        Box::new(HstsMissing),
        Box::new(SitemapMissing),
    ]
}

/// Diagnostic factor for pages that could not be fetched. Always emits, so
/// even a timed-out page yields at least one factor.
struct Availability;

impl Rule for Availability {
    fn id(&self) -> &'static str {
        "technical.availability"
    }
    fn name(&self) -> &'static str {
        "Page reachable"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        let factor = match &page.crawl.fetch_error {
            None => self.page_factor(
                page,
                Evidence::new().set("http_status", page.crawl.http_status.unwrap_or(0)),
                Verdict::Pass,
            ),
            Some(error) => self
                .page_factor(
                    page,
                    Evidence::new()
                        .set("error", error.to_string())
                        .set("http_status", page.crawl.http_status.unwrap_or(0)),
                    Verdict::Deficient,
                )
                .with_notes(format!("Fetch failed: {}", error)),
        };
        vec![factor]
    }
}

struct TitleMissing;

impl Rule for TitleMissing {
    fn id(&self) -> &'static str {
        "technical.title.missing"
    }
    fn name(&self) -> &'static str {
        "Title tag present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
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
        let length = page.crawl.title.as_deref().map(str::len).unwrap_or(0);
        let verdict = if length == 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(page, Evidence::new().set("title_length", length as u64), verdict)]
    }
}

struct TitleLength;

impl Rule for TitleLength {
    fn id(&self) -> &'static str {
        "technical.title.length"
    }
    fn name(&self) -> &'static str {
        "Title length in range"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let Some(title) = page.crawl.title.as_deref().filter(|t| !t.is_empty()) else {
            // The missing-title rule owns that deficiency.
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        };
        let length = title.chars().count();
        let verdict = if (TITLE_MIN..=TITLE_MAX).contains(&length) {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("title_length", length as u64)
                .set("min", TITLE_MIN as u64)
                .set("max", TITLE_MAX as u64),
            verdict,
        )]
    }
}

struct MetaDescriptionMissing;

impl Rule for MetaDescriptionMissing {
    fn id(&self) -> &'static str {
        "technical.meta_description.missing"
    }
    fn name(&self) -> &'static str {
        "Meta description present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
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
        let length = page
            .crawl
            .meta_description
            .as_deref()
            .map(str::len)
            .unwrap_or(0);
        let verdict = if length == 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new().set("description_length", length as u64),
            verdict,
        )]
    }
}

struct MetaDescriptionLength;

impl Rule for MetaDescriptionLength {
    fn id(&self) -> &'static str {
        "technical.meta_description.length"
    }
    fn name(&self) -> &'static str {
        "Meta description length in range"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let Some(description) = page
            .crawl
            .meta_description
            .as_deref()
            .filter(|d| !d.is_empty())
        else {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        };
        let length = description.chars().count();
        let verdict = if (DESCRIPTION_MIN..=DESCRIPTION_MAX).contains(&length) {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("description_length", length as u64)
                .set("min", DESCRIPTION_MIN as u64)
                .set("max", DESCRIPTION_MAX as u64),
            verdict,
        )]
    }
}

struct H1Missing;

impl Rule for H1Missing {
    fn id(&self) -> &'static str {
        "technical.h1.missing"
    }
    fn name(&self) -> &'static str {
        "H1 heading present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
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
        let count = page.crawl.h1.len();
        let verdict = if count == 0 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(page, Evidence::new().set("h1_count", count as u64), verdict)]
    }
}

struct H1Multiple;

impl Rule for H1Multiple {
    fn id(&self) -> &'static str {
        "technical.h1.multiple"
    }
    fn name(&self) -> &'static str {
        "Single H1 heading"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let count = page.crawl.h1.len();
        let verdict = if count > 1 {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(page, Evidence::new().set("h1_count", count as u64), verdict)]
    }
}

/// Heading outline skips a level (an H3 with no H2 above it).
struct HeadingStructure;

impl Rule for HeadingStructure {
    fn id(&self) -> &'static str {
        "technical.headings.order"
    }
    fn name(&self) -> &'static str {
        "Heading levels not skipped"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let crawl = &page.crawl;
        let levels = [
            crawl.h1.len(),
            crawl.h2.len(),
            crawl.h3.len(),
            crawl.h4.len(),
            crawl.h5.len(),
            crawl.h6.len(),
        ];
        // A skip means some level above the deepest populated one is empty,
        // e.g. an H3 on a page with no H2.
        let has_gap = levels
            .iter()
            .rposition(|count| *count > 0)
            .map(|deepest| levels[..deepest].iter().any(|count| *count == 0))
            .unwrap_or(false);
        let verdict = if has_gap {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new()
                .set("h1_count", levels[0] as u64)
                .set("h2_count", levels[1] as u64)
                .set("h3_count", levels[2] as u64),
            verdict,
        )]
    }
}

struct CanonicalMissing;

impl Rule for CanonicalMissing {
    fn id(&self) -> &'static str {
        "technical.canonical.missing"
    }
    fn name(&self) -> &'static str {
        "Canonical link present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let present = page.crawl.canonical.is_some();
        let verdict = if present { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(page, Evidence::new().set("canonical_present", present), verdict)]
    }
}

struct RobotsNoindex;

impl Rule for RobotsNoindex {
    fn id(&self) -> &'static str {
        "technical.robots.noindex"
    }
    fn name(&self) -> &'static str {
        "Page indexable"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let noindex = page
            .crawl
            .robots_directives
            .iter()
            .any(|d| d == "noindex" || d == "none");
        let verdict = if noindex { Verdict::Deficient } else { Verdict::Pass };
        vec![self
            .page_factor(page, Evidence::new().set("noindex", noindex), verdict)
            .with_notes(if noindex {
                "robots meta tag blocks indexing"
            } else {
                ""
            })]
    }
}

struct LangMissing;

impl Rule for LangMissing {
    fn id(&self) -> &'static str {
        "technical.lang.missing"
    }
    fn name(&self) -> &'static str {
        "Document language declared"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() {
            return vec![self.not_applicable(page, "page could not be fetched")];
        }
        let present = page.crawl.lang.is_some();
        let verdict = if present { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(page, Evidence::new().set("lang_present", present), verdict)]
    }
}

struct HttpsMissing;

impl Rule for HttpsMissing {
    fn id(&self) -> &'static str {
        "security.https.missing"
    }
    fn name(&self) -> &'static str {
        "Served over HTTPS"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn critical(&self) -> bool {
        true
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        // Scheme is known even for failed fetches.
        let https = page.crawl.scheme == "https";
        let verdict = if https { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(
            page,
            Evidence::new().set("scheme", page.crawl.scheme.clone()),
            verdict,
        )]
    }
}

struct TlsInvalid;

impl Rule for TlsInvalid {
    fn id(&self) -> &'static str {
        "security.tls.invalid"
    }
    fn name(&self) -> &'static str {
        "TLS certificate valid"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::High
    }
    fn critical(&self) -> bool {
        true
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.scheme != "https" {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let tls_failed = matches!(page.crawl.fetch_error, Some(FetchError::Tls));
        let verdict = if tls_failed {
            Verdict::Deficient
        } else {
            Verdict::Pass
        };
        vec![self.page_factor(
            page,
            Evidence::new().set("tls_valid", page.crawl.tls_valid && !tls_failed),
            verdict,
        )]
    }
}

struct HstsMissing;

impl Rule for HstsMissing {
    fn id(&self) -> &'static str {
        "security.hsts.missing"
    }
    fn name(&self) -> &'static str {
        "HSTS header present"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn importance(&self) -> Importance {
        Importance::Low
    }
    fn check_page(&self, page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        if page.crawl.fetch_error.is_some() || page.crawl.scheme != "https" {
            return vec![self.page_factor(page, Evidence::new(), Verdict::NotApplicable)];
        }
        let present = page.crawl.hsts_header_present;
        let verdict = if present { Verdict::Pass } else { Verdict::Deficient };
        vec![self.page_factor(page, Evidence::new().set("hsts_present", present), verdict)]
    }
}

struct SitemapMissing;

impl Rule for SitemapMissing {
    fn id(&self) -> &'static str {
        "technical.sitemap.missing"
    }
    fn name(&self) -> &'static str {
        "XML sitemap discoverable"
    }
    fn category(&self) -> FactorCategory {
        FactorCategory::TechnicalSeo
    }
    fn check_site(&self, ctx: &SiteContext) -> Vec<AuditFactor> {
        let verdict = if ctx.has_sitemap {
            Verdict::Pass
        } else {
            Verdict::Deficient
        };
        vec![self.factor(Evidence::new().set("sitemap_found", ctx.has_sitemap), verdict)]
    }
}
