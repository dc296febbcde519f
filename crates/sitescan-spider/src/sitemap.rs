use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use xml::reader::{EventReader, XmlEvent};

/// Sitemap-index recursion ceiling; a depth-4 nesting is ignored.
const MAX_INDEX_DEPTH: usize = 3;
/// Total sitemap documents fetched per run.
const MAX_SITEMAPS: usize = 50;

/// One `<url>` entry from a sitemap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub url: Url,
    pub last_modified: Option<DateTime<Utc>>,
    pub change_frequency: Option<String>,
    pub priority: Option<f64>,
}

/// Parsed sitemap document: either an index of further sitemaps or a URL set.
#[derive(Debug, Default)]
struct SitemapDocument {
    child_sitemaps: Vec<String>,
    entries: Vec<SitemapEntry>,
}

/// Walks a site's sitemaps: the conventional locations plus robots.txt
/// `Sitemap:` directives, recursing through index files up to the depth and
/// document caps.
#[derive(Debug)]
pub struct SitemapCrawler {
    client: Client,
    fetched: HashSet<String>,
}

impl SitemapCrawler {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client for sitemap crawler")?;
        Ok(Self {
            client,
            fetched: HashSet::new(),
        })
    }

    /// Discover and parse every reachable sitemap for `base`, deduplicated
    /// by URL. `robots_sitemaps` come from the robots.txt directives.
    pub async fn discover(
        &mut self,
        base: &Url,
        robots_sitemaps: &[String],
    ) -> Result<Vec<SitemapEntry>> {
        let origin = base.origin().ascii_serialization();
        let mut roots = vec![
            format!("{}/sitemap.xml", origin),
            format!("{}/sitemap_index.xml", origin),
        ];
        for directive in robots_sitemaps {
            if !roots.contains(directive) {
                roots.push(directive.clone());
            }
        }

        let mut all = Vec::new();
        for root in roots {
            self.walk(&root, 1, &mut all).await;
        }

        let mut seen = HashSet::new();
        all.retain(|entry| seen.insert(entry.url.to_string()));

        info!(
            urls = all.len(),
            sitemaps = self.fetched.len(),
            "Sitemap discovery finished"
        );
        Ok(all)
    }

    /// Depth-first walk; `depth` counts the current document, so an index at
    /// depth 3 still contributes its children's URLs while a deeper nesting
    /// is ignored.
    async fn walk(&mut self, sitemap_url: &str, depth: usize, out: &mut Vec<SitemapEntry>) {
        if depth > MAX_INDEX_DEPTH || self.fetched.len() >= MAX_SITEMAPS {
            debug!(url = %sitemap_url, depth = depth, "Skipping sitemap past caps");
            return;
        }
        if !self.fetched.insert(sitemap_url.to_string()) {
            return;
        }

        let content = match self.fetch(sitemap_url).await {
            Ok(Some(content)) => content,
            Ok(None) => return,
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "Failed to fetch sitemap");
                return;
            }
        };

        let document = parse_sitemap_document(&content);
        debug!(
            url = %sitemap_url,
            entries = document.entries.len(),
            children = document.child_sitemaps.len(),
            "Parsed sitemap"
        );
        out.extend(document.entries);

        for child in document.child_sitemaps {
            Box::pin(self.walk(&child, depth + 1, out)).await;
        }
    }

    async fn fetch(&self, sitemap_url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(sitemap_url)
            .send()
            .await
            .context("Failed to fetch sitemap")?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let content = response
            .text()
            .await
            .context("Failed to read sitemap body")?;
        Ok(Some(content))
    }
}

/// Parse one sitemap document, tracking element context so only `<loc>`
/// values inside `<url>`/`<sitemap>` blocks are taken. Unknown extensions
/// are ignored.
fn parse_sitemap_document(content: &str) -> SitemapDocument {
    let mut document = SitemapDocument::default();
    let parser = EventReader::from_str(content);

    let mut in_url_block = false;
    let mut in_sitemap_block = false;
    let mut current_field: Option<String> = None;

    let mut loc = String::new();
    let mut lastmod = String::new();
    let mut changefreq = String::new();
    let mut priority = String::new();

    for event in parser {
        match event {
            Ok(XmlEvent::StartElement { name, .. }) => match name.local_name.as_str() {
                "url" => {
                    in_url_block = true;
                    loc.clear();
                    lastmod.clear();
                    changefreq.clear();
                    priority.clear();
                }
                "sitemap" => {
                    in_sitemap_block = true;
                    loc.clear();
                }
                field @ ("loc" | "lastmod" | "changefreq" | "priority") => {
                    current_field = Some(field.to_string());
                }
                _ => current_field = None,
            },
            Ok(XmlEvent::Characters(data)) => {
                if !(in_url_block || in_sitemap_block) {
                    continue;
                }
                match current_field.as_deref() {
                    Some("loc") => loc.push_str(data.trim()),
                    Some("lastmod") => lastmod.push_str(data.trim()),
                    Some("changefreq") => changefreq.push_str(data.trim()),
                    Some("priority") => priority.push_str(data.trim()),
                    _ => {}
                }
            }
            Ok(XmlEvent::EndElement { name }) => match name.local_name.as_str() {
                "url" => {
                    in_url_block = false;
                    if let Ok(url) = Url::parse(&loc) {
                        document.entries.push(SitemapEntry {
                            url,
                            last_modified: DateTime::parse_from_rfc3339(&lastmod)
                                .ok()
                                .map(|dt| dt.with_timezone(&Utc)),
                            change_frequency: (!changefreq.is_empty()).then(|| changefreq.clone()),
                            priority: priority.parse().ok(),
                        });
                    }
                }
                "sitemap" => {
                    in_sitemap_block = false;
                    if Url::parse(&loc).is_ok() {
                        document.child_sitemaps.push(loc.clone());
                    }
                }
                "loc" | "lastmod" | "changefreq" | "priority" => current_field = None,
                _ => {}
            },
            Err(e) => {
                debug!(error = %e, "Sitemap XML parse error, keeping entries so far");
                break;
            }
            _ => {}
        }
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url>
    <loc>https://example.com/</loc>
    <lastmod>2024-05-01T10:00:00+00:00</lastmod>
    <changefreq>weekly</changefreq>
    <priority>0.9</priority>
  </url>
  <url><loc>https://example.com/contact</loc></url>
</urlset>"#;

    #[test]
    fn parses_urlset_fields() {
        let document = parse_sitemap_document(URLSET);
        assert_eq!(document.entries.len(), 2);
        assert!(document.child_sitemaps.is_empty());
        let first = &document.entries[0];
        assert_eq!(first.url.as_str(), "https://example.com/");
        assert_eq!(first.priority, Some(0.9));
        assert_eq!(first.change_frequency.as_deref(), Some("weekly"));
        assert!(first.last_modified.is_some());
    }

    #[test]
    fn parses_sitemap_index() {
        let index = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
</sitemapindex>"#;
        let document = parse_sitemap_document(index);
        assert_eq!(document.child_sitemaps.len(), 2);
        assert!(document.entries.is_empty());
    }

    #[test]
    fn malformed_xml_keeps_entries_seen_so_far() {
        let broken = r#"<urlset><url><loc>https://example.com/ok</loc></url><url><loc"#;
        let document = parse_sitemap_document(broken);
        assert_eq!(document.entries.len(), 1);
    }

    #[tokio::test]
    async fn walks_index_to_depth_three_but_not_four() {
        let server = MockServer::start().await;
        let index = |child: &str| {
            format!(
                r#"<sitemapindex><sitemap><loc>{}/{}</loc></sitemap></sitemapindex>"#,
                server.uri(),
                child
            )
        };
        // depth 1: index -> depth 2: index -> depth 3: urlset (walked)
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index("level2.xml")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/level2.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index("level3.xml")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/level3.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<urlset><url><loc>https://example.com/deep</loc></url></urlset>
                   <sitemapindex><sitemap><loc>{}/level4.xml</loc></sitemap></sitemapindex>"#,
                server.uri()
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut crawler =
            SitemapCrawler::new("SiteScanBot/test", Duration::from_secs(5)).expect("crawler");
        let base = Url::parse(&server.uri()).expect("valid URL");
        let entries = crawler.discover(&base, &[]).await.expect("discovery runs");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url.as_str(), "https://example.com/deep");
        // level4 was referenced at depth 4 and must not have been fetched.
        assert!(!crawler.fetched.iter().any(|s| s.contains("level4")));
    }
}
