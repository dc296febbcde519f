use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sitescan_types::{PageImage, PageLink, UrlKey};
use tracing::debug;
use url::Url;

/// Tags whose text content is never user-visible.
const NON_VISIBLE_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "head"];

/// Static word count below which a page is considered thin for the
/// js-heavy heuristic.
const THIN_STATIC_WORDS: usize = 200;
/// Script tag count at which a page starts looking like an app shell.
const SCRIPT_TAG_THRESHOLD: usize = 10;
/// Inline-script share of total HTML bytes treated as script-dominated.
const SCRIPT_BYTE_RATIO: f64 = 0.3;

/// Structural signals extracted from one HTML document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub h4: Vec<String>,
    pub h5: Vec<String>,
    pub h6: Vec<String>,
    pub meta_description: Option<String>,
    pub canonical: Option<String>,
    pub robots_directives: Vec<String>,
    pub lang: Option<String>,
    pub viewport: Option<String>,
    pub internal_links: Vec<PageLink>,
    pub external_links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    pub visible_text: String,
    pub word_count: usize,
    pub json_ld_types: Vec<String>,
    pub forms_count: usize,
    pub form_input_count: usize,
    pub script_count: usize,
    pub inline_script_bytes: usize,
    pub spa_root_marker: bool,
    pub empty_body_with_deferred_scripts: bool,
}

impl ParsedPage {
    /// The 2-of-4 js-heavy rule, evaluated against the static document.
    ///
    /// Signals: thin static text, many script tags, an SPA root marker (or
    /// an effectively empty body with deferred scripts), and a high
    /// script-to-HTML byte ratio. Two or more firing marks the page as
    /// needing script execution to reveal its content.
    pub fn js_heavy(&self, html_bytes: usize) -> bool {
        let thin_text = self.word_count < THIN_STATIC_WORDS;
        let many_scripts = self.script_count >= SCRIPT_TAG_THRESHOLD;
        let spa_shell = self.spa_root_marker || self.empty_body_with_deferred_scripts;
        let script_dominated = html_bytes > 0
            && self.inline_script_bytes as f64 / html_bytes as f64 >= SCRIPT_BYTE_RATIO;

        let signals = [thin_text, many_scripts, spa_shell, script_dominated]
            .iter()
            .filter(|s| **s)
            .count();
        signals >= 2
    }
}

/// Parse an HTML body into its structural signals.
///
/// `base_url` is the final URL after redirects; relative hrefs resolve
/// against it and internal/external link classification compares against
/// its normalized host.
pub fn parse_page(html: &str, base_url: &Url) -> Result<ParsedPage> {
    let document = Html::parse_document(html);
    let base_key = UrlKey::from_url(base_url);

    let mut page = ParsedPage {
        title: select_first_text(&document, "title")?,
        h1: select_all_text(&document, "h1")?,
        h2: select_all_text(&document, "h2")?,
        h3: select_all_text(&document, "h3")?,
        h4: select_all_text(&document, "h4")?,
        h5: select_all_text(&document, "h5")?,
        h6: select_all_text(&document, "h6")?,
        meta_description: select_meta_content(&document, "description")?,
        viewport: select_meta_content(&document, "viewport")?,
        ..ParsedPage::default()
    };

    page.robots_directives = select_meta_content(&document, "robots")?
        .map(|content| {
            content
                .split(',')
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        })
        .unwrap_or_default();

    page.canonical = select_first_attr(&document, "link[rel=\"canonical\"]", "href")?
        .and_then(|href| base_url.join(&href).ok())
        .map(|u| u.to_string());

    page.lang = select_first_attr(&document, "html", "lang")?;

    extract_links(&document, base_url, &base_key, &mut page)?;
    extract_images(&document, base_url, &mut page)?;
    extract_text_and_scripts(&document, &mut page);
    extract_structured_data(&document, &mut page)?;
    extract_forms(&document, &mut page)?;

    page.spa_root_marker = detect_spa_marker(&document)?;
    page.empty_body_with_deferred_scripts =
        page.word_count == 0 && has_deferred_scripts(&document)?;

    debug!(
        words = page.word_count,
        scripts = page.script_count,
        internal = page.internal_links.len(),
        external = page.external_links.len(),
        "Parsed page"
    );

    Ok(page)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {}: {}", css, e))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_first_text(document: &Html, css: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty()))
}

fn select_all_text(document: &Html, css: &str) -> Result<Vec<String>> {
    let sel = selector(css)?;
    Ok(document.select(&sel).map(element_text).collect())
}

fn select_first_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn select_meta_content(document: &Html, name: &str) -> Result<Option<String>> {
    let sel = selector("meta[name]")?;
    for element in document.select(&sel) {
        let matches = element
            .value()
            .attr("name")
            .map(|n| n.eq_ignore_ascii_case(name))
            .unwrap_or(false);
        if matches {
            if let Some(content) = element.value().attr("content") {
                let content = content.trim();
                if !content.is_empty() {
                    return Ok(Some(content.to_string()));
                }
            }
        }
    }
    Ok(None)
}

fn extract_links(
    document: &Html,
    base_url: &Url,
    base_key: &UrlKey,
    page: &mut ParsedPage,
) -> Result<()> {
    let sel = selector("a[href]")?;
    for anchor in document.select(&sel) {
        let href = match anchor.value().attr("href") {
            Some(h) => h.trim(),
            None => continue,
        };
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            continue;
        }
        let resolved = match base_url.join(href) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
            _ => continue,
        };

        let rel_attrs = anchor
            .value()
            .attr("rel")
            .map(|rel| {
                rel.split_whitespace()
                    .map(|r| r.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        let link = PageLink {
            href: resolved.to_string(),
            anchor_text: element_text(anchor),
            rel_attrs,
        };

        if base_key.host_covers(&UrlKey::from_url(&resolved)) {
            page.internal_links.push(link);
        } else {
            page.external_links.push(link);
        }
    }
    Ok(())
}

fn extract_images(document: &Html, base_url: &Url, page: &mut ParsedPage) -> Result<()> {
    let sel = selector("img")?;
    for img in document.select(&sel) {
        let src = match img.value().attr("src") {
            Some(s) if !s.trim().is_empty() => s.trim(),
            _ => continue,
        };
        let resolved = base_url
            .join(src)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string());

        page.images.push(PageImage {
            src: resolved,
            alt: img.value().attr("alt").map(|a| a.trim().to_string()),
            width: img.value().attr("width").and_then(|w| w.parse().ok()),
            height: img.value().attr("height").and_then(|h| h.parse().ok()),
            loading_attr: img.value().attr("loading").map(|l| l.to_ascii_lowercase()),
        });
    }
    Ok(())
}

/// Walk every text node once, skipping subtrees that never render, and tally
/// script statistics on the way.
fn extract_text_and_scripts(document: &Html, page: &mut ParsedPage) {
    let mut raw_text = String::new();

    for node in document.tree.nodes() {
        if let Some(element) = node.value().as_element() {
            if element.name() == "script" {
                page.script_count += 1;
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_script = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| e.name() == "script")
                .unwrap_or(false)
        });
        if in_script {
            page.inline_script_bytes += text.text.len();
            continue;
        }
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| NON_VISIBLE_TAGS.contains(&e.name()))
                .unwrap_or(false)
        });
        if !hidden {
            raw_text.push_str(&text.text);
            raw_text.push(' ');
        }
    }

    page.visible_text = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
    page.word_count = page.visible_text.split_whitespace().count();
}

/// Collect `@type` values from JSON-LD blocks. A block that fails to parse
/// as JSON is ignored; the rules only need the type inventory.
fn extract_structured_data(document: &Html, page: &mut ParsedPage) -> Result<()> {
    let sel = selector(r#"script[type="application/ld+json"]"#)?;
    for block in document.select(&sel) {
        let raw = block.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            continue;
        };
        collect_ld_types(&value, &mut page.json_ld_types);
    }
    Ok(())
}

fn collect_ld_types(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            match map.get("@type") {
                Some(serde_json::Value::String(t)) => out.push(t.clone()),
                Some(serde_json::Value::Array(types)) => {
                    out.extend(types.iter().filter_map(|t| t.as_str().map(String::from)));
                }
                _ => {}
            }
            if let Some(graph) = map.get("@graph") {
                collect_ld_types(graph, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_ld_types(item, out);
            }
        }
        _ => {}
    }
}

fn extract_forms(document: &Html, page: &mut ParsedPage) -> Result<()> {
    let form_sel = selector("form")?;
    let input_sel = selector("input, textarea, select")?;
    page.forms_count = document.select(&form_sel).count();
    page.form_input_count = document.select(&input_sel).count();
    Ok(())
}

fn detect_spa_marker(document: &Html) -> Result<bool> {
    for css in ["div#root", "div#app", "[data-reactroot]"] {
        let sel = selector(css)?;
        if document.select(&sel).next().is_some() {
            return Ok(true);
        }
    }
    Ok(false)
}

fn has_deferred_scripts(document: &Html) -> Result<bool> {
    let sel = selector("script[src]")?;
    Ok(document.select(&sel).next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/").expect("valid URL")
    }

    #[test]
    fn extracts_head_signals() {
        let html = r#"<html lang="en"><head>
            <title> Acme Plumbing </title>
            <meta name="description" content="Fast local plumbing.">
            <meta name="viewport" content="width=device-width, initial-scale=1">
            <meta name="robots" content="noindex, NOFOLLOW">
            <link rel="canonical" href="/home">
            </head><body><h1>Plumbing</h1><h2>Drains</h2></body></html>"#;
        let page = parse_page(html, &base()).expect("parses");
        assert_eq!(page.title.as_deref(), Some("Acme Plumbing"));
        assert_eq!(page.meta_description.as_deref(), Some("Fast local plumbing."));
        assert_eq!(page.canonical.as_deref(), Some("https://example.com/home"));
        assert_eq!(page.robots_directives, vec!["noindex", "nofollow"]);
        assert_eq!(page.lang.as_deref(), Some("en"));
        assert_eq!(page.h1, vec!["Plumbing"]);
        assert_eq!(page.h2, vec!["Drains"]);
    }

    #[test]
    fn classifies_internal_and_external_links() {
        let html = r##"<body>
            <a href="/contact" rel="nofollow">Contact us</a>
            <a href="https://www.example.com/about">About</a>
            <a href="https://other.org/x">Elsewhere</a>
            <a href="mailto:hi@example.com">mail</a>
            <a href="#top">top</a>
            </body>"##;
        let page = parse_page(html, &base()).expect("parses");
        assert_eq!(page.internal_links.len(), 2);
        assert_eq!(page.external_links.len(), 1);
        assert_eq!(page.internal_links[0].anchor_text, "Contact us");
        assert_eq!(page.internal_links[0].rel_attrs, vec!["nofollow"]);
    }

    #[test]
    fn images_carry_alt_and_dimensions() {
        let html = r#"<body>
            <img src="/a.jpg" alt="A kitchen" width="640" height="480" loading="lazy">
            <img src="/b.jpg">
            </body>"#;
        let page = parse_page(html, &base()).expect("parses");
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0].alt.as_deref(), Some("A kitchen"));
        assert_eq!(page.images[0].width, Some(640));
        assert_eq!(page.images[0].loading_attr.as_deref(), Some("lazy"));
        assert_eq!(page.images[1].alt, None);
    }

    #[test]
    fn visible_text_excludes_scripts_and_styles() {
        let html = r#"<body>
            <p>Hello   world</p>
            <script>var hidden = "not text";</script>
            <style>p { color: red }</style>
            </body>"#;
        let page = parse_page(html, &base()).expect("parses");
        assert_eq!(page.visible_text, "Hello world");
        assert_eq!(page.word_count, 2);
        assert_eq!(page.script_count, 1);
        assert!(page.inline_script_bytes > 0);
    }

    #[test]
    fn spa_shell_is_js_heavy() {
        let scripts: String = (0..12)
            .map(|i| format!(r#"<script src="/chunk-{}.js"></script>"#, i))
            .collect();
        let html = format!(r#"<body><div id="root"></div>{}</body>"#, scripts);
        let page = parse_page(&html, &base()).expect("parses");
        assert!(page.spa_root_marker);
        assert!(page.script_count >= 10);
        // Thin text + many scripts + SPA marker: three of four signals.
        assert!(page.js_heavy(html.len()));
    }

    #[test]
    fn json_ld_types_and_forms_are_inventoried() {
        let html = r#"<body>
            <script type="application/ld+json">
              {"@context": "https://schema.org", "@type": "LocalBusiness", "name": "Acme"}
            </script>
            <script type="application/ld+json">
              {"@graph": [{"@type": "Organization"}, {"@type": ["WebSite", "CreativeWork"]}]}
            </script>
            <form action="/contact"><input name="email"><textarea name="msg"></textarea></form>
            </body>"#;
        let page = parse_page(html, &base()).expect("parses");
        assert_eq!(
            page.json_ld_types,
            vec!["LocalBusiness", "Organization", "WebSite", "CreativeWork"]
        );
        assert_eq!(page.forms_count, 1);
        assert_eq!(page.form_input_count, 2);
    }

    #[test]
    fn content_rich_page_is_not_js_heavy() {
        let words = "plumbing service and repair in town ".repeat(60);
        let html = format!("<body><p>{}</p><script>var a=1;</script></body>", words);
        let page = parse_page(&html, &base()).expect("parses");
        assert!(!page.js_heavy(html.len()));
    }
}
