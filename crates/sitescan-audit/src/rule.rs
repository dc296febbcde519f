use crate::context::SiteContext;
use sitescan_types::{AuditFactor, Evidence, FactorCategory, Importance, PageRecord, Verdict};

/// One independent check.
///
/// Rules are pure: no I/O, no shared mutable state, and identical inputs
/// produce identical factors. A rule computes its verdict from measured
/// evidence; it cannot hand a status in directly (`AuditFactor::new`
/// enforces that).
///
/// Membership in the Critical Set is declared here via [`Rule::critical`],
/// keyed by rule id. The classification engine never infers criticality
/// from names or descriptions.
pub trait Rule: Send + Sync {
    /// Stable slug, e.g. `technical.h1.missing`.
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn category(&self) -> FactorCategory;

    fn importance(&self) -> Importance {
        Importance::Medium
    }

    /// Declares this rule into the closed Critical Set.
    fn critical(&self) -> bool {
        false
    }

    /// Per-page check. The default emits nothing, for site-wide rules.
    fn check_page(&self, _page: &PageRecord, _ctx: &SiteContext) -> Vec<AuditFactor> {
        Vec::new()
    }

    /// Site-wide check, run once per audit. The default emits nothing.
    fn check_site(&self, _ctx: &SiteContext) -> Vec<AuditFactor> {
        Vec::new()
    }

    /// Factor skeleton carrying this rule's identity and importance.
    fn factor(&self, evidence: Evidence, verdict: Verdict) -> AuditFactor {
        AuditFactor::new(self.id(), self.category(), self.name(), evidence, verdict)
            .with_importance(self.importance())
    }

    /// Factor bound to a page, with the tier and page-type value copies the
    /// classifier and scorer read.
    fn page_factor(&self, page: &PageRecord, evidence: Evidence, verdict: Verdict) -> AuditFactor {
        self.factor(evidence, verdict)
            .for_page(page.crawl.url.clone(), page.tier, page.page_type)
    }

    /// The `NotApplicable` shape for pages whose parsed fields are absent.
    fn not_applicable(&self, page: &PageRecord, reason: &str) -> AuditFactor {
        self.page_factor(
            page,
            Evidence::new().set("fetch_failed", true),
            Verdict::NotApplicable,
        )
        .with_notes(reason)
    }
}
