use serde::{Deserialize, Serialize};
use sitescan_types::Tier;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Page-count and wall-clock limits for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Frontier admission ceiling.
    pub max_pages: usize,
    /// Run wall clock.
    pub max_time: Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_time: Duration::from_secs(900),
        }
    }
}

/// Enforces the run budgets.
///
/// Tier-1 and tier-2 pages are reserved first: when admitting a URL would
/// take the frontier past the page budget, only tier-3 URLs are dropped.
/// The dequeue order then guarantees higher tiers crawl before any tier-3
/// backlog, so a completed run never exceeds `max_pages`.
#[derive(Debug)]
pub struct BudgetManager {
    config: BudgetConfig,
    started: Instant,
    claimed: AtomicUsize,
    dropped_t3: AtomicBool,
}

impl BudgetManager {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            claimed: AtomicUsize::new(0),
            dropped_t3: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Whether a discovered URL may join the frontier.
    pub fn admit(&self, tier: Tier, frontier_pending: usize) -> bool {
        if tier == Tier::T3 {
            let committed = self.claimed.load(Ordering::SeqCst) + frontier_pending;
            if committed >= self.config.max_pages {
                self.dropped_t3.store(true, Ordering::SeqCst);
                debug!(committed = committed, "Dropping tier-3 URL at page budget");
                return false;
            }
        }
        true
    }

    /// Claim one fetch slot. Returns false once the page budget is spent;
    /// the caller stops dispatching.
    pub fn claim_page(&self) -> bool {
        self.claimed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < self.config.max_pages).then_some(current + 1)
            })
            .is_ok()
    }

    /// Return a claim that did not produce a page (robots-blocked URL).
    pub fn release_claim(&self) {
        self.claimed.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn pages_claimed(&self) -> usize {
        self.claimed.load(Ordering::SeqCst)
    }

    pub fn page_budget_spent(&self) -> bool {
        self.claimed.load(Ordering::SeqCst) >= self.config.max_pages
    }

    pub fn deadline_passed(&self) -> bool {
        self.started.elapsed() >= self.config.max_time
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether any tier-3 URL was refused admission.
    pub fn saw_t3_drop(&self) -> bool {
        self.dropped_t3.load(Ordering::SeqCst)
    }
}
