use anyhow::{Context, Result};
use dashmap::DashMap;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Configuration for robots.txt compliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotsConfig {
    /// When false, `Disallow` rules are ignored but `Crawl-delay` is still
    /// honored.
    pub respect_robots: bool,
    /// Upper clamp on crawl-delay so a hostile robots.txt cannot starve a run.
    pub max_crawl_delay: Duration,
    /// TTL for cached robots.txt files.
    pub cache_ttl: Duration,
    pub user_agent: String,
    pub fetch_timeout: Duration,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect_robots: true,
            max_crawl_delay: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(3600),
            user_agent: "SiteScanBot/0.3 (+https://sitescan.dev/bot)".to_string(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Parsed view of one host's robots.txt.
#[derive(Debug, Clone, Default)]
pub struct RobotsSnapshot {
    pub content: String,
    pub crawl_delay: Option<Duration>,
    pub sitemaps: Vec<String>,
}

#[derive(Debug, Clone)]
struct CachedRobots {
    snapshot: RobotsSnapshot,
    cached_at: Instant,
}

impl CachedRobots {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Per-host robots.txt cache and matcher.
///
/// A robots.txt that cannot be fetched is treated as empty (permissive),
/// matching crawler convention.
#[derive(Debug)]
pub struct RobotsManager {
    config: RobotsConfig,
    cache: DashMap<String, CachedRobots>,
    client: Client,
}

impl RobotsManager {
    pub fn new(config: RobotsConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.fetch_timeout)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client for robots manager")?;

        Ok(Self {
            config,
            cache: DashMap::new(),
            client,
        })
    }

    /// Whether a URL may be crawled under the host's `Disallow` rules.
    pub async fn is_allowed(&self, url: &Url) -> Result<bool> {
        if !self.config.respect_robots {
            debug!(url = %url, "Robots.txt respect disabled");
            return Ok(true);
        }

        let snapshot = self.snapshot_for(url).await?;
        if snapshot.content.is_empty() {
            return Ok(true);
        }

        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(
            &snapshot.content,
            &self.config.user_agent,
            url.as_str(),
        );
        debug!(url = %url, allowed = allowed, "Robots.txt check completed");
        Ok(allowed)
    }

    /// The host's crawl-delay, clamped. Honored even when `respect_robots`
    /// is off.
    pub async fn crawl_delay(&self, url: &Url) -> Result<Option<Duration>> {
        Ok(self.snapshot_for(url).await?.crawl_delay)
    }

    /// Sitemap URLs declared in the host's robots.txt.
    pub async fn sitemaps(&self, url: &Url) -> Result<Vec<String>> {
        Ok(self.snapshot_for(url).await?.sitemaps)
    }

    async fn snapshot_for(&self, url: &Url) -> Result<RobotsSnapshot> {
        url.host_str().context("URL has no host")?;
        // Keyed by origin so non-default ports resolve their own robots.txt.
        let origin = url.origin().ascii_serialization();

        if let Some(cached) = self.cache.get(&origin) {
            if !cached.is_expired(self.config.cache_ttl) {
                return Ok(cached.snapshot.clone());
            }
        }

        let robots_url = format!("{}/robots.txt", origin);
        let content = match self.fetch_robots_txt(&robots_url).await {
            Ok(content) => content,
            Err(e) => {
                warn!(origin = %origin, error = %e, "Failed to fetch robots.txt, allowing all");
                String::new()
            }
        };

        let snapshot = parse_robots(&content, self.config.max_crawl_delay);
        info!(
            origin = %origin,
            crawl_delay = ?snapshot.crawl_delay,
            sitemaps = snapshot.sitemaps.len(),
            "Updated robots.txt cache"
        );

        self.cache.insert(
            origin,
            CachedRobots {
                snapshot: snapshot.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }

    async fn fetch_robots_txt(&self, robots_url: &str) -> Result<String> {
        let response = self
            .client
            .get(robots_url)
            .send()
            .await
            .context("Failed to fetch robots.txt")?;

        if response.status().is_success() {
            response
                .text()
                .await
                .context("Failed to read robots.txt content")
        } else {
            debug!(robots_url = %robots_url, status = %response.status(), "robots.txt not found");
            Ok(String::new())
        }
    }
}

/// Extract the crawl-delay and sitemap directives. `Disallow` matching is
/// delegated to the robotstxt matcher against the raw content.
fn parse_robots(content: &str, max_crawl_delay: Duration) -> RobotsSnapshot {
    let mut snapshot = RobotsSnapshot {
        content: content.to_string(),
        ..RobotsSnapshot::default()
    };

    for line in content.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();

        if let Some(value) = lower.strip_prefix("crawl-delay:") {
            if let Ok(seconds) = value.trim().parse::<f64>() {
                if seconds > 0.0 {
                    let delay = Duration::from_secs_f64(seconds).min(max_crawl_delay);
                    snapshot.crawl_delay = Some(match snapshot.crawl_delay {
                        Some(existing) => existing.max(delay),
                        None => delay,
                    });
                }
            }
        } else if lower.starts_with("sitemap:") {
            let value = trimmed[8..].trim();
            if let Ok(parsed) = Url::parse(value) {
                if parsed.scheme() == "http" || parsed.scheme() == "https" {
                    snapshot.sitemaps.push(value.to_string());
                }
            }
        }
    }

    snapshot
}
