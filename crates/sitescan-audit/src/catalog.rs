use crate::context::SiteContext;
use crate::rule::Rule;
use crate::rules::default_rules;
use sitescan_types::{AuditFactor, Evidence, PageRecord, Verdict};
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

/// Per-rule emission ceiling; the overflow collapses into one summary factor.
const DEFAULT_EMISSION_CAP: usize = 50;

/// The registry of checks. Built once per process and iterated per audit;
/// rules are stateless so the catalog is freely shared.
pub struct RuleCatalog {
    rules: Vec<Box<dyn Rule>>,
    emission_cap: usize,
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            emission_cap: DEFAULT_EMISSION_CAP,
        }
    }
}

impl RuleCatalog {
    pub fn new(rules: Vec<Box<dyn Rule>>, emission_cap: usize) -> Self {
        Self {
            rules,
            emission_cap,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ids of rules that declared themselves critical. This is the closed
    /// Critical Set the classification engine keys on.
    pub fn critical_ids(&self) -> HashSet<String> {
        self.rules
            .iter()
            .filter(|rule| rule.critical())
            .map(|rule| rule.id().to_string())
            .collect()
    }

    /// Run every rule over every page plus the site-wide pass.
    ///
    /// A rule that panics is contained: the defect is logged under the rule
    /// id and surfaced as a single `NotApplicable` factor naming it; sibling
    /// factors are unaffected.
    pub fn run(&self, pages: &[PageRecord], ctx: &SiteContext) -> Vec<AuditFactor> {
        let mut factors = Vec::new();

        for rule in &self.rules {
            let mut emitted = Vec::new();

            for page in pages {
                match catch_unwind(AssertUnwindSafe(|| rule.check_page(page, ctx))) {
                    Ok(page_factors) => emitted.extend(page_factors),
                    Err(_) => {
                        error!(rule_id = rule.id(), url = %page.crawl.url, "Rule panicked, containing to one factor");
                        emitted.push(internal_defect_factor(rule.as_ref(), Some(page)));
                    }
                }
            }

            match catch_unwind(AssertUnwindSafe(|| rule.check_site(ctx))) {
                Ok(site_factors) => emitted.extend(site_factors),
                Err(_) => {
                    error!(rule_id = rule.id(), "Site-wide rule panicked, containing to one factor");
                    emitted.push(internal_defect_factor(rule.as_ref(), None));
                }
            }

            factors.extend(self.cap_emissions(rule.as_ref(), emitted));
        }

        debug!(factors = factors.len(), rules = self.rules.len(), "Rule catalog pass complete");
        factors
    }

    fn cap_emissions(&self, rule: &dyn Rule, mut emitted: Vec<AuditFactor>) -> Vec<AuditFactor> {
        if emitted.len() <= self.emission_cap {
            return emitted;
        }
        let suppressed = emitted.len() - self.emission_cap;
        emitted.truncate(self.emission_cap);
        emitted.push(
            rule.factor(
                Evidence::new().set("suppressed_occurrences", suppressed as u64),
                Verdict::Deficient,
            )
            .with_notes(format!(
                "{} further occurrences beyond the first {} summarized",
                suppressed, self.emission_cap
            )),
        );
        emitted
    }
}

fn internal_defect_factor(rule: &dyn Rule, page: Option<&PageRecord>) -> AuditFactor {
    let factor = rule
        .factor(Evidence::new().set("internal_defect", true), Verdict::NotApplicable)
        .with_notes(format!("internal defect in rule {}", rule.id()));
    match page {
        Some(page) => factor.for_page(page.crawl.url.clone(), page.tier, page.page_type),
        None => factor,
    }
}
