use crate::state::AppState;
use chrono::Utc;
use sitescan_audit::AuditEngine;
use sitescan_spider::{CrawlConfig, Crawler, RunPhase};
use sitescan_types::{AuditReport, AuditStatus};
use tracing::{error, info, instrument};
use url::Url;

/// Launch an audit run in the background. The caller has already persisted
/// the `Queued` report and registered the run handle.
pub fn spawn_audit(state: AppState, audit_id: String, seed: Url, config: CrawlConfig) {
    tokio::spawn(async move {
        run_audit(&state, &audit_id, seed, config).await;
        state.finish_run(&audit_id);
    });
}

#[instrument(skip(state, config), fields(audit_id = %audit_id, seed = %seed))]
async fn run_audit(state: &AppState, audit_id: &str, seed: Url, config: CrawlConfig) {
    let mut report = match state.store.load(audit_id).await {
        Ok(Some(report)) => report,
        Ok(None) => AuditReport::queued(audit_id, seed.as_str()),
        Err(e) => {
            error!(error = %e, "Could not load queued report");
            return;
        }
    };

    report.status = AuditStatus::Running;
    persist(state, report.clone()).await;

    let crawler = match Crawler::new(config) {
        Ok(crawler) => crawler,
        Err(e) => {
            finalize_failed(state, report, format!("configuration rejected: {}", e)).await;
            return;
        }
    };

    let cancel = state
        .runs
        .get(audit_id)
        .map(|handle| handle.cancel.clone())
        .unwrap_or_default();

    let outcome = match crawler.crawl(seed, cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            crawler.set_phase(RunPhase::Failed).await;
            finalize_failed(state, report, format!("crawl error: {}", e)).await;
            return;
        }
    };

    if let Some(seed_error) = &outcome.seed_failure {
        crawler.set_phase(RunPhase::Failed).await;
        report.pages = outcome.pages;
        finalize_failed(state, report, seed_error.to_string()).await;
        return;
    }

    crawler.set_phase(RunPhase::Analyzing).await;
    let engine = AuditEngine::default();
    let has_sitemap = outcome.stats.sitemap_urls_discovered > 0;
    let (factors, mut summary) = engine.audit(&outcome.pages, has_sitemap);
    summary.pages_crawled = outcome.stats.pages_crawled;
    summary.pages_failed = outcome.stats.pages_failed;
    summary.duration_ms = outcome.stats.duration_ms;

    crawler.set_phase(RunPhase::Finalizing).await;
    report.pages = outcome.pages;
    report.factors = factors;
    report.summary = summary;
    report.reached_max_pages = outcome.reached_max_pages;
    report.finished_at = Some(Utc::now());
    report.status = AuditStatus::Completed;

    info!(
        pages = report.pages.len(),
        factors = report.factors.len(),
        priority_ofi = report.summary.priority_ofi,
        "Audit completed"
    );
    persist(state, report).await;
    crawler.set_phase(RunPhase::Done).await;
}

async fn finalize_failed(state: &AppState, mut report: AuditReport, reason: String) {
    error!(audit_id = %report.id, reason = %reason, "Audit failed");
    report.status = AuditStatus::Failed { reason };
    report.finished_at = Some(Utc::now());
    persist(state, report).await;
}

async fn persist(state: &AppState, report: AuditReport) {
    if let Err(e) = state.store.save(report).await {
        error!(error = %e, "Failed to persist report");
    }
}
