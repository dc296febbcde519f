use crate::aggregate::Aggregator;
use crate::catalog::RuleCatalog;
use crate::context::SiteContext;
use crate::ofi::OfiClassifier;
use sitescan_types::{AuditFactor, AuditSummary, PageRecord};
use tracing::{info, instrument};

/// The analysis pipeline: rules → priority matrix → demotion → scoring.
///
/// Stateless between audits; a single engine serves every run in the
/// process.
pub struct AuditEngine {
    catalog: RuleCatalog,
    classifier: OfiClassifier,
    aggregator: Aggregator,
}

impl Default for AuditEngine {
    fn default() -> Self {
        let catalog = RuleCatalog::default();
        let classifier = OfiClassifier::new(catalog.critical_ids());
        Self {
            catalog,
            classifier,
            aggregator: Aggregator,
        }
    }
}

impl AuditEngine {
    pub fn with_catalog(catalog: RuleCatalog) -> Self {
        let classifier = OfiClassifier::new(catalog.critical_ids());
        Self {
            catalog,
            classifier,
            aggregator: Aggregator,
        }
    }

    /// Run the full analysis over a crawl's pages.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn audit(&self, pages: &[PageRecord], has_sitemap: bool) -> (Vec<AuditFactor>, AuditSummary) {
        let ctx = SiteContext::build(pages, has_sitemap);

        let mut factors = self.catalog.run(pages, &ctx);
        for factor in factors.iter_mut() {
            factor.status = self.classifier.classify(factor);
        }
        self.aggregator.demote_for_pure_archive(&mut factors, &ctx);

        let summary = self.aggregator.summarize(&factors);
        info!(
            factors = summary.total,
            priority_ofi = summary.priority_ofi,
            score = summary.weighted_score,
            "Audit analysis complete"
        );
        (factors, summary)
    }
}
