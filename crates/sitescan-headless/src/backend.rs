use crate::pool::BrowserPool;
use anyhow::{anyhow, Context, Result};
use sitescan_html::{parse_page, to_crawl_result, FetchMeta};
use sitescan_types::{FetchError, FetchMode, PageCrawlResult, UrlKey};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};
use url::Url;

/// Configuration for the headless backend.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Hard cap on a render, navigation included.
    pub render_deadline: Duration,
    /// Quiet period treated as network idle.
    pub network_idle: Duration,
    /// Wait for lazy-loaded content after the bottom scroll.
    pub post_scroll_settle: Duration,
    /// Wait on a pool checkout before giving up.
    pub checkout_timeout: Duration,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            render_deadline: Duration::from_secs(20),
            network_idle: Duration::from_millis(500),
            post_scroll_settle: Duration::from_millis(300),
            checkout_timeout: Duration::from_secs(10),
        }
    }
}

/// Headless fetch backend.
///
/// Renders the page in a pooled browser context, provokes lazy loading with
/// one scroll to the bottom, and extracts the same signals as the HTTP
/// backend from the post-script DOM. Contextual failures come back as a
/// `PageCrawlResult` with `fetch_error = Other`; this backend never throws.
pub struct HeadlessFetcher {
    pool: BrowserPool,
    config: HeadlessConfig,
}

impl HeadlessFetcher {
    pub fn new(pool: BrowserPool, config: HeadlessConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &BrowserPool {
        &self.pool
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> PageCrawlResult {
        let key = UrlKey::from_url(url);
        match self.render(url, key.clone()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url = %url, error = %e, "Headless render failed");
                PageCrawlResult::failed(key, FetchMode::Headless, FetchError::Other(e.to_string()))
            }
        }
    }

    async fn render(&self, url: &Url, key: UrlKey) -> Result<PageCrawlResult> {
        let started = Instant::now();

        let checkout = timeout(self.config.checkout_timeout, self.pool.checkout())
            .await
            .map_err(|_| anyhow!("Browser checkout timed out"))?
            .context("Failed to check out browser")?;

        let page = checkout
            .browser()
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;

        let render = async {
            page.goto(url.as_str())
                .await
                .context("Navigation failed")?;
            page.wait_for_navigation()
                .await
                .context("Navigation never settled")?;

            // Network idle: give in-flight requests one quiet period to
            // drain; a busy page just falls through to the deadline.
            let _ = timeout(self.config.network_idle, page.wait_for_navigation()).await;

            // One scroll to the bottom provokes lazy-loaded content.
            if let Err(e) = page
                .evaluate("window.scrollTo(0, document.body.scrollHeight);")
                .await
            {
                debug!(url = %url, error = %e, "Scroll evaluation failed");
            }
            tokio::time::sleep(self.config.post_scroll_settle).await;

            page.content().await.context("Failed to capture DOM")
        };

        let html = match timeout(self.config.render_deadline, render).await {
            Ok(Ok(html)) => html,
            Ok(Err(e)) => {
                let _ = page.close().await;
                return Err(e);
            }
            Err(_) => {
                let _ = page.close().await;
                return Err(anyhow!(
                    "Render exceeded {}s deadline",
                    self.config.render_deadline.as_secs()
                ));
            }
        };

        let _ = page.close().await;

        let parsed = parse_page(&html, url).context("Failed to parse rendered DOM")?;
        let tls_valid = url.scheme() == "https";

        Ok(to_crawl_result(
            parsed,
            FetchMeta {
                url: key,
                final_url: url.to_string(),
                http_status: None,
                fetch_mode: FetchMode::Headless,
                duration_ms: started.elapsed().as_millis() as u64,
                bytes_downloaded: html.len() as u64,
                hsts_header_present: false,
                tls_valid,
                // js_heavy is the static backend's call; the orchestrator
                // carries it over when it replaces the record.
                js_heavy: false,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_fetch_contract() {
        let config = HeadlessConfig::default();
        assert_eq!(config.render_deadline, Duration::from_secs(20));
        assert_eq!(config.network_idle, Duration::from_millis(500));
    }
}
