use crate::budget::BudgetManager;
use crate::cancel::CancelFlag;
use crate::classify::PageClassifier;
use crate::config::CrawlConfig;
use crate::frontier::{Frontier, FrontierEntry};
use crate::sitemap::SitemapCrawler;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sitescan_fetch::{HostPoliteness, HttpFetcher, RobotsManager};
use sitescan_headless::{BrowserPool, BrowserPoolConfig, HeadlessConfig, HeadlessFetcher};
use sitescan_types::{FetchError, PageCrawlResult, PageRecord, Tier, UrlKey};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Word count under which a tier-1 page's static fetch is considered too
/// thin to audit without script execution.
const THIN_CONTENT_WORDS: usize = 200;
/// Idle workers poll the frontier at this interval while peers are busy.
const POP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Per-run orchestrator state machine. Transitions are one-way; terminal
/// states are `Done` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Initializing,
    Crawling,
    Analyzing,
    Finalizing,
    Done,
    Failed,
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub bytes_downloaded: u64,
    pub headless_refetches: usize,
    /// URLs the sitemap walk surfaced, whether or not they were admitted.
    pub sitemap_urls_discovered: usize,
    pub duration_ms: u64,
}

/// What a finished crawl hands to the analysis stage.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub pages: Vec<PageRecord>,
    pub reached_max_pages: bool,
    pub stats: CrawlStats,
    /// Set when the seed itself was unreachable after retries; the run is
    /// then finalized as `Failed`.
    pub seed_failure: Option<FetchError>,
}

/// Drives a crawl from seed to a terminal state under concurrency, budget,
/// and politeness constraints, choosing the fetch backend per URL.
pub struct Crawler {
    config: CrawlConfig,
    classifier: PageClassifier,
    http: Arc<HttpFetcher>,
    headless: Option<Arc<HeadlessFetcher>>,
    robots: Arc<RobotsManager>,
    politeness: Arc<HostPoliteness>,
    phase: Arc<RwLock<RunPhase>>,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;

        let mut fetch_config = config.fetch.clone();
        fetch_config.user_agent = config.user_agent();
        let http = Arc::new(HttpFetcher::new(fetch_config).context("Failed to build HTTP backend")?);

        let headless = (config.headless_pool > 0).then(|| {
            let pool = BrowserPool::new(BrowserPoolConfig {
                pool_size: config.headless_pool,
                ..BrowserPoolConfig::default()
            });
            Arc::new(HeadlessFetcher::new(pool, HeadlessConfig::default()))
        });

        let robots = Arc::new(
            RobotsManager::new(config.robots_config()).context("Failed to build robots manager")?,
        );
        let politeness = Arc::new(HostPoliteness::new(
            config.max_concurrent_per_host,
            config.min_host_interval(),
        ));

        Ok(Self {
            classifier: PageClassifier::new(config.classifier.clone()),
            config,
            http,
            headless,
            robots,
            politeness,
            phase: Arc::new(RwLock::new(RunPhase::Initializing)),
        })
    }

    pub async fn phase(&self) -> RunPhase {
        *self.phase.read().await
    }

    pub async fn set_phase(&self, phase: RunPhase) {
        let mut current = self.phase.write().await;
        debug!(from = ?*current, to = ?phase, "Run phase transition");
        *current = phase;
    }

    /// Run the crawl to a terminal state. Cancellation finalizes normally
    /// with the pages collected so far; only an unreachable seed is a
    /// failure, reported through `CrawlOutcome::seed_failure`.
    #[instrument(skip(self, cancel), fields(seed = %seed))]
    pub async fn crawl(&self, seed: Url, cancel: CancelFlag) -> Result<CrawlOutcome> {
        self.set_phase(RunPhase::Initializing).await;

        let seed_key = UrlKey::from_url(&seed);
        let budget = BudgetManager::new(self.config.budget.clone());
        let mut frontier = Frontier::new();

        let (seed_tier, seed_type) = self.classifier.classify(&seed, None);
        frontier.discover(seed.clone(), seed_tier, seed_type);

        // Sitemap discovery enlarges the frontier before workers start; a
        // site without sitemaps just falls back to in-page link extraction.
        let sitemap_urls_discovered = if cancel.is_cancelled() {
            0
        } else {
            self.seed_from_sitemaps(&seed, &seed_key, &budget, &mut frontier)
                .await
        };

        info!(frontier = frontier.pending(), "Frontier seeded, starting workers");
        self.set_phase(RunPhase::Crawling).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            classifier: self.classifier.clone(),
            http: self.http.clone(),
            headless: self.headless.clone(),
            robots: self.robots.clone(),
            politeness: self.politeness.clone(),
            frontier: Mutex::new(frontier),
            budget,
            cancel: cancel.clone(),
            seed_key,
            include_subdomains: self.config.include_subdomains,
            busy: AtomicUsize::new(0),
            reached_max: AtomicBool::new(false),
            bytes_downloaded: AtomicU64::new(0),
            pages_failed: AtomicUsize::new(0),
            headless_refetches: AtomicUsize::new(0),
            seed_failure: Mutex::new(None),
            tx,
        });

        let workers: Vec<_> = (0..self.config.concurrency)
            .map(|worker_id| {
                let shared = shared.clone();
                tokio::spawn(async move { worker_loop(worker_id, shared).await })
            })
            .collect();

        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "Crawl worker panicked");
            }
        }

        // All worker senders are gone once the loops return; the collector
        // drains what they produced, in emission order.
        let mut pages = Vec::new();
        while let Ok(record) = rx.try_recv() {
            pages.push(record);
        }

        let reached_max_pages = {
            let frontier = shared.frontier.lock().await;
            shared.reached_max.load(Ordering::SeqCst)
                || shared.budget.saw_t3_drop()
                || (shared.budget.page_budget_spent() && !frontier.is_empty())
        };

        let stats = CrawlStats {
            pages_crawled: pages.len(),
            pages_failed: shared.pages_failed.load(Ordering::SeqCst),
            bytes_downloaded: shared.bytes_downloaded.load(Ordering::SeqCst),
            headless_refetches: shared.headless_refetches.load(Ordering::SeqCst),
            sitemap_urls_discovered,
            duration_ms: shared.budget.elapsed().as_millis() as u64,
        };
        let seed_failure = shared.seed_failure.lock().await.clone();

        if let Some(pool) = self.headless.as_ref().map(|h| h.pool()) {
            pool.shutdown().await;
        }

        info!(
            pages = stats.pages_crawled,
            failed = stats.pages_failed,
            headless = stats.headless_refetches,
            reached_max = reached_max_pages,
            "Crawl finished"
        );

        Ok(CrawlOutcome {
            pages,
            reached_max_pages,
            stats,
            seed_failure,
        })
    }

    /// Returns how many URLs the sitemap walk surfaced.
    async fn seed_from_sitemaps(
        &self,
        seed: &Url,
        seed_key: &UrlKey,
        budget: &BudgetManager,
        frontier: &mut Frontier,
    ) -> usize {
        let robots_sitemaps = self.robots.sitemaps(seed).await.unwrap_or_default();

        let mut crawler = match SitemapCrawler::new(
            &self.config.user_agent(),
            self.config.fetch.request_timeout,
        ) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Sitemap crawler unavailable, skipping discovery");
                return 0;
            }
        };

        match crawler.discover(seed, &robots_sitemaps).await {
            Ok(entries) => {
                let discovered = entries.len();
                for entry in entries {
                    let key = UrlKey::from_url(&entry.url);
                    if !in_scope(seed_key, &key, self.config.include_subdomains) {
                        continue;
                    }
                    let (tier, page_type) = self.classifier.classify(&entry.url, None);
                    if frontier.contains(&key) || budget.admit(tier, frontier.pending()) {
                        frontier.discover(entry.url, tier, page_type);
                    }
                }
                discovered
            }
            Err(e) => {
                debug!(error = %e, "Sitemap discovery failed");
                0
            }
        }
    }
}

struct Shared {
    classifier: PageClassifier,
    http: Arc<HttpFetcher>,
    headless: Option<Arc<HeadlessFetcher>>,
    robots: Arc<RobotsManager>,
    politeness: Arc<HostPoliteness>,
    frontier: Mutex<Frontier>,
    budget: BudgetManager,
    cancel: CancelFlag,
    seed_key: UrlKey,
    include_subdomains: bool,
    busy: AtomicUsize,
    reached_max: AtomicBool,
    bytes_downloaded: AtomicU64,
    pages_failed: AtomicUsize,
    headless_refetches: AtomicUsize,
    seed_failure: Mutex<Option<FetchError>>,
    tx: mpsc::UnboundedSender<PageRecord>,
}

/// One cooperative worker: pop, fetch, classify, discover, repeat. No lock
/// is held across an await on network I/O.
async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    loop {
        if shared.cancel.is_cancelled() {
            debug!(worker_id, "Worker stopping on cancellation");
            break;
        }
        if shared.budget.deadline_passed() {
            debug!(worker_id, "Worker stopping at wall-clock deadline");
            let pending = { !shared.frontier.lock().await.is_empty() };
            if pending {
                shared.reached_max.store(true, Ordering::SeqCst);
            }
            break;
        }

        let entry = { shared.frontier.lock().await.pop() };
        let Some(entry) = entry else {
            if shared.busy.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(POP_POLL_INTERVAL).await;
            continue;
        };

        if !shared.budget.claim_page() {
            shared.reached_max.store(true, Ordering::SeqCst);
            break;
        }

        shared.busy.fetch_add(1, Ordering::SeqCst);
        let produced = process_entry(&shared, entry).await;
        if let Some(record) = produced {
            let _ = shared.tx.send(record);
        } else {
            shared.budget.release_claim();
        }
        shared.busy.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Fetch one URL through the backend decision tree and feed discoveries
/// back to the frontier. `None` means the claim produced no page (robots
/// block or cancellation mid-flight).
async fn process_entry(shared: &Shared, entry: FrontierEntry) -> Option<PageRecord> {
    let url = entry.url.clone();

    match shared.robots.is_allowed(&url).await {
        Ok(true) => {}
        Ok(false) => {
            debug!(url = %url, "Skipping URL disallowed by robots.txt");
            return None;
        }
        Err(e) => {
            debug!(url = %url, error = %e, "Robots check failed, proceeding");
        }
    }

    let host = url.host_str().unwrap_or_default().to_string();
    let crawl_delay = shared.robots.crawl_delay(&url).await.ok().flatten();

    let http_result = {
        let _permit = shared.politeness.acquire(&host, crawl_delay).await.ok()?;
        tokio::select! {
            _ = shared.cancel.cancelled() => return None,
            result = shared.http.fetch(&url) => result,
        }
    };

    let mut result = http_result;
    shared
        .bytes_downloaded
        .fetch_add(result.bytes_downloaded, Ordering::SeqCst);

    if needs_headless(entry.tier, &result) {
        if let Some(headless) = &shared.headless {
            let rendered = {
                let _permit = shared.politeness.acquire(&host, crawl_delay).await.ok()?;
                tokio::select! {
                    _ = shared.cancel.cancelled() => return None,
                    rendered = headless.fetch(&url) => rendered,
                }
            };
            if rendered.is_success() {
                shared.headless_refetches.fetch_add(1, Ordering::SeqCst);
                shared
                    .bytes_downloaded
                    .fetch_add(rendered.bytes_downloaded, Ordering::SeqCst);
                result = merge_headless(result, rendered);
            } else {
                debug!(url = %url, error = ?rendered.fetch_error, "Headless re-fetch failed, keeping HTTP result");
            }
        }
    }

    if result.fetch_error.is_some() {
        shared.pages_failed.fetch_add(1, Ordering::SeqCst);
    }

    if entry.key == shared.seed_key {
        if let Some(error) = seed_level_failure(&result) {
            warn!(url = %url, error = %error, "Seed unreachable, failing the run");
            *shared.seed_failure.lock().await = Some(error);
            shared.cancel.cancel();
        }
    }

    // Feed in-page discoveries back to the frontier.
    if result.is_success() {
        let mut frontier = shared.frontier.lock().await;
        for link in &result.internal_links {
            let Ok(target) = Url::parse(&link.href) else {
                continue;
            };
            let key = UrlKey::from_url(&target);
            if !in_scope(&shared.seed_key, &key, shared.include_subdomains) {
                continue;
            }
            let (tier, page_type) = shared.classifier.classify(&target, None);
            if frontier.contains(&key) || shared.budget.admit(tier, frontier.pending()) {
                frontier.discover(target, tier, page_type);
            }
        }
    }

    let (tier, page_type) = shared.classifier.classify(&url, Some(&result));
    Some(PageRecord {
        crawl: result,
        tier,
        page_type,
    })
}

/// The widened headless gating rule: any tier-1 page with weak static
/// content goes through the headless path, not just js-heavy ones.
fn needs_headless(tier: Tier, http_result: &PageCrawlResult) -> bool {
    match tier {
        Tier::T1 => {
            http_result.js_heavy
                || (http_result.is_success() && http_result.word_count < THIN_CONTENT_WORDS)
                || http_result
                    .fetch_error
                    .as_ref()
                    .map(FetchError::suggests_js_gate)
                    .unwrap_or(false)
        }
        Tier::T2 => http_result.js_heavy,
        Tier::T3 => false,
    }
}

/// Replace the HTTP record with the rendered one, carrying over the signals
/// only the static fetch can produce.
fn merge_headless(http: PageCrawlResult, mut rendered: PageCrawlResult) -> PageCrawlResult {
    rendered.http_status = rendered.http_status.or(http.http_status);
    rendered.hsts_header_present = http.hsts_header_present;
    rendered.js_heavy = http.js_heavy;
    rendered
}

fn seed_level_failure(result: &PageCrawlResult) -> Option<FetchError> {
    match &result.fetch_error {
        // A parse failure still proves the host answered.
        None | Some(FetchError::ParseError) => None,
        Some(error) => Some(error.clone()),
    }
}

fn in_scope(seed: &UrlKey, candidate: &UrlKey, include_subdomains: bool) -> bool {
    if include_subdomains {
        seed.host_covers(candidate)
    } else {
        seed.host() == candidate.host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
    }

    fn page(title: &str, body: &str) -> String {
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            title, body
        )
    }

    fn test_config(max_pages: usize) -> CrawlConfig {
        CrawlConfig {
            // One worker keeps dequeue order observable in assertions.
            concurrency: 1,
            headless_pool: 0,
            per_host_rps: 200.0,
            budget: crate::budget::BudgetConfig {
                max_pages,
                max_time: Duration::from_secs(30),
            },
            ..CrawlConfig::default()
        }
    }

    async fn mount_empty_meta(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn crawls_seed_and_discovered_links() {
        let server = MockServer::start().await;
        mount_empty_meta(&server).await;
        let filler = "word ".repeat(250);
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(&page(
                "Home",
                &format!(
                    r#"<h1>Home</h1><p>{}</p><a href="/contact">Contact</a><a href="/blog/a">Post</a>"#,
                    filler
                ),
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(html(&page("Contact", "<h1>Contact</h1><p>Call us.</p>")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blog/a"))
            .respond_with(html(&page("Post", "<h1>Post</h1><p>Words.</p>")))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(10)).expect("crawler builds");
        let seed = Url::parse(&server.uri()).expect("valid URL");
        let outcome = crawler.crawl(seed, CancelFlag::new()).await.expect("crawl runs");

        assert_eq!(outcome.pages.len(), 3);
        assert!(!outcome.reached_max_pages);
        assert!(outcome.seed_failure.is_none());
        // The seed dequeues first; the T2 contact page beats the T3 post.
        assert_eq!(outcome.pages[0].tier, Tier::T1);
        assert_eq!(outcome.pages[1].tier, Tier::T2);
        assert_eq!(outcome.pages[2].tier, Tier::T3);
    }

    #[tokio::test]
    async fn page_budget_caps_the_run_and_sets_the_flag() {
        let server = MockServer::start().await;
        mount_empty_meta(&server).await;
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/blog/post-{}">p{}</a>"#, i, i))
            .collect();
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(&page("Home", &format!("<h1>Home</h1>{}", links))))
            .mount(&server)
            .await;
        for i in 0..20 {
            Mock::given(method("GET"))
                .and(path(format!("/blog/post-{}", i)))
                .respond_with(html(&page("Post", "<p>body</p>")))
                .mount(&server)
                .await;
        }

        let crawler = Crawler::new(test_config(5)).expect("crawler builds");
        let seed = Url::parse(&server.uri()).expect("valid URL");
        let outcome = crawler.crawl(seed, CancelFlag::new()).await.expect("crawl runs");

        assert_eq!(outcome.pages.len(), 5);
        assert!(outcome.reached_max_pages);
    }

    #[tokio::test]
    async fn unreachable_seed_fails_the_run() {
        let server = MockServer::start().await;
        mount_empty_meta(&server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(10)).expect("crawler builds");
        let seed = Url::parse(&server.uri()).expect("valid URL");
        let outcome = crawler.crawl(seed, CancelFlag::new()).await.expect("crawl runs");

        assert_eq!(outcome.seed_failure, Some(FetchError::Http4xx(404)));
    }

    #[tokio::test]
    async fn cancellation_finalizes_with_pages_collected_so_far() {
        let server = MockServer::start().await;
        mount_empty_meta(&server).await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(&page("Home", "<h1>Home</h1>")))
            .mount(&server)
            .await;

        let cancel = CancelFlag::new();
        cancel.cancel();

        let crawler = Crawler::new(test_config(10)).expect("crawler builds");
        let seed = Url::parse(&server.uri()).expect("valid URL");
        let outcome = crawler.crawl(seed, cancel).await.expect("crawl runs");

        assert!(outcome.seed_failure.is_none());
        assert!(outcome.pages.is_empty());
    }

    #[tokio::test]
    async fn robots_disallow_is_honored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(&page(
                "Home",
                r#"<h1>Home</h1><a href="/private/x">secret</a><a href="/contact">Contact</a>"#,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(html(&page("Contact", "<p>hi</p>")))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config(10)).expect("crawler builds");
        let seed = Url::parse(&server.uri()).expect("valid URL");
        let outcome = crawler.crawl(seed, CancelFlag::new()).await.expect("crawl runs");

        let paths: Vec<String> = outcome
            .pages
            .iter()
            .map(|p| p.crawl.final_url.clone())
            .collect();
        assert!(paths.iter().any(|p| p.ends_with("/contact")));
        assert!(!paths.iter().any(|p| p.contains("/private")));
    }

    #[test]
    fn headless_gating_follows_the_widened_rule() {
        let key = UrlKey::parse("https://example.com/").expect("key");
        let mut thin = PageCrawlResult::failed(key.clone(), sitescan_types::FetchMode::Http, FetchError::Timeout);
        thin.fetch_error = None;
        thin.word_count = 50;
        assert!(needs_headless(Tier::T1, &thin));
        assert!(!needs_headless(Tier::T2, &thin));
        assert!(!needs_headless(Tier::T3, &thin));

        let mut heavy = thin.clone();
        heavy.word_count = 500;
        heavy.js_heavy = true;
        assert!(needs_headless(Tier::T2, &heavy));

        let gated = PageCrawlResult::failed(key, sitescan_types::FetchMode::Http, FetchError::Http4xx(403));
        assert!(needs_headless(Tier::T1, &gated));
        assert!(!needs_headless(Tier::T2, &gated));
    }
}
