use anyhow::{Context, Result};
use bytes::BytesMut;
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use sitescan_html::{parse_page, to_crawl_result, FetchMeta};
use sitescan_types::{FetchError, FetchMode, PageCrawlResult, UrlKey};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Redirect hops followed before a chain is recorded as `TooManyRedirects`.
const MAX_REDIRECTS: usize = 5;

/// Configuration for the plain HTTP backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent advertising the tool's identity.
    pub user_agent: String,
    /// Total per-request deadline, connection included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Streamed response cap; larger bodies are truncated and flagged.
    pub max_body_bytes: usize,
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "SiteScanBot/0.3 (+https://sitescan.dev/bot)".to_string(),
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            max_body_bytes: 10 * 1024 * 1024,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry schedule for transient per-URL failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff before each retry; the last entry repeats if exhausted.
    pub backoff: Vec<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: vec![Duration::from_secs(1), Duration::from_secs(3)],
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .get(attempt as usize)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }
}

/// The plain HTTP fetch backend.
///
/// Every outcome, including failures, is a `PageCrawlResult`; callers
/// distinguish "absent data" from "absent page" via `fetch_error`.
#[derive(Debug)]
pub struct HttpFetcher {
    config: FetchConfig,
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(redirect_policy())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch and parse one page, retrying transient failures per the
    /// configured schedule. `Http4xx` is terminal on the first response.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> PageCrawlResult {
        let key = UrlKey::from_url(url);
        let mut attempt = 0u32;

        loop {
            let result = self.fetch_once(url, key.clone()).await;
            let retryable = result
                .fetch_error
                .as_ref()
                .map(FetchError::is_retryable)
                .unwrap_or(false);

            if !retryable || attempt >= self.config.retry.max_retries {
                return result;
            }

            let delay = self.config.retry.delay_for(attempt);
            debug!(
                url = %url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = ?result.fetch_error,
                "Retrying fetch after transient error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &Url, key: UrlKey) -> PageCrawlResult {
        let started = Instant::now();

        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                return PageCrawlResult::failed(key, FetchMode::Http, classify_reqwest_error(&e));
            }
        };

        let status = response.status().as_u16();
        if (400..500).contains(&status) {
            let mut result = PageCrawlResult::failed(key, FetchMode::Http, FetchError::Http4xx(status));
            result.http_status = Some(status);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }
        if status >= 500 {
            let mut result = PageCrawlResult::failed(key, FetchMode::Http, FetchError::Http5xx(status));
            result.http_status = Some(status);
            result.duration_ms = started.elapsed().as_millis() as u64;
            return result;
        }

        let final_url = response.url().clone();
        let hsts = response.headers().contains_key("strict-transport-security");
        let charset = charset_from_headers(&response);

        let (body_bytes, truncated) = match self.read_capped(response).await {
            Ok(pair) => pair,
            Err(e) => {
                let mut result = PageCrawlResult::failed(key, FetchMode::Http, e);
                result.http_status = Some(status);
                result.duration_ms = started.elapsed().as_millis() as u64;
                return result;
            }
        };
        if truncated {
            warn!(url = %url, cap = self.config.max_body_bytes, "Response truncated at size cap");
        }

        let body = decode_body(&body_bytes, charset.as_deref());
        let parsed = match parse_page(&body, &final_url) {
            Ok(p) => p,
            Err(e) => {
                debug!(url = %url, error = %e, "HTML parse failed");
                let mut result = PageCrawlResult::failed(key, FetchMode::Http, FetchError::ParseError);
                result.http_status = Some(status);
                result.final_url = final_url.to_string();
                result.duration_ms = started.elapsed().as_millis() as u64;
                result.bytes_downloaded = body_bytes.len() as u64;
                return result;
            }
        };

        let js_heavy = parsed.js_heavy(body_bytes.len());
        let tls_valid = final_url.scheme() == "https";

        to_crawl_result(
            parsed,
            FetchMeta {
                url: key,
                final_url: final_url.to_string(),
                http_status: Some(status),
                fetch_mode: FetchMode::Http,
                duration_ms: started.elapsed().as_millis() as u64,
                bytes_downloaded: body_bytes.len() as u64,
                hsts_header_present: hsts,
                tls_valid,
                js_heavy,
            },
        )
    }

    /// Stream the body up to the configured cap.
    async fn read_capped(&self, mut response: Response) -> Result<(Vec<u8>, bool), FetchError> {
        let mut buf = BytesMut::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let remaining = self.config.max_body_bytes.saturating_sub(buf.len());
                    if chunk.len() >= remaining {
                        buf.extend_from_slice(&chunk[..remaining]);
                        return Ok((buf.to_vec(), true));
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => return Ok((buf.to_vec(), false)),
                Err(e) => return Err(classify_reqwest_error(&e)),
            }
        }
    }
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt: Attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("redirect chain exceeded the limit");
        }
        let downgrade = attempt
            .previous()
            .last()
            .map(|prev| prev.scheme() == "https" && attempt.url().scheme() == "http")
            .unwrap_or(false);
        if downgrade {
            // Never follow https -> http; surface the hop as the final response.
            return attempt.stop();
        }
        attempt.follow()
    })
}

/// Map a reqwest error into the fetch taxonomy.
pub(crate) fn classify_reqwest_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        return FetchError::Timeout;
    }
    if error.is_redirect() {
        return FetchError::TooManyRedirects;
    }
    let chain = error_chain_text(error);
    if error.is_connect() {
        if chain.contains("dns") || chain.contains("name or service") {
            return FetchError::Dns;
        }
        if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
            return FetchError::Tls;
        }
    }
    if chain.contains("certificate") || chain.contains("tls") {
        return FetchError::Tls;
    }
    FetchError::Other(error.to_string())
}

fn error_chain_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string().to_ascii_lowercase();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        text.push(' ');
        text.push_str(&cause.to_string().to_ascii_lowercase());
        source = cause.source();
    }
    text
}

fn charset_from_headers(response: &Response) -> Option<String> {
    response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| {
            ct.split(';').find_map(|part| {
                let part = part.trim();
                part.strip_prefix("charset=")
                    .or_else(|| part.strip_prefix("CHARSET="))
                    .map(|c| c.trim_matches('"').to_ascii_lowercase())
            })
        })
}

/// Decode a body using the advertised charset or a BOM, falling back to
/// lossy UTF-8. Latin-1 family charsets decode byte-per-char; UTF-16 decodes
/// via its BOM.
pub(crate) fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return decode_utf16(&bytes[2..], true);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16(&bytes[2..], false);
    }
    match charset {
        Some("iso-8859-1") | Some("latin1") | Some("windows-1252") => {
            bytes.iter().map(|&b| b as char).collect()
        }
        Some("utf-16") | Some("utf-16le") => decode_utf16(bytes, true),
        Some("utf-16be") => decode_utf16(bytes, false),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchConfig {
            retry: RetryConfig {
                max_retries: 0,
                backoff: vec![Duration::from_millis(1)],
            },
            ..FetchConfig::default()
        })
        .expect("client builds")
    }

    #[tokio::test]
    async fn fetches_and_parses_a_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Acme</title></head><body><h1>Hi</h1><p>Welcome home</p></body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).expect("valid URL");
        let result = fetcher().fetch(&url).await;

        assert!(result.is_success());
        assert_eq!(result.http_status, Some(200));
        assert_eq!(result.title.as_deref(), Some("Acme"));
        assert_eq!(result.h1, vec!["Hi"]);
        assert!(result.bytes_downloaded > 0);
        assert_eq!(result.fetch_mode, FetchMode::Http);
    }

    #[tokio::test]
    async fn http_404_is_terminal_with_empty_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).expect("valid URL");
        let result = fetcher().fetch(&url).await;

        assert_eq!(result.fetch_error, Some(FetchError::Http4xx(404)));
        assert_eq!(result.word_count, 0);
        assert!(result.title.is_none());
    }

    #[tokio::test]
    async fn http_500_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><body><p>recovered</p></body></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchConfig {
            retry: RetryConfig {
                max_retries: 2,
                backoff: vec![Duration::from_millis(5)],
            },
            ..FetchConfig::default()
        })
        .expect("client builds");

        let url = Url::parse(&format!("{}/flaky", server.uri())).expect("valid URL");
        let result = fetcher.fetch(&url).await;
        assert!(result.is_success());
        assert!(result.visible_text.contains("recovered"));
    }

    #[tokio::test]
    async fn oversized_body_is_truncated_not_failed() {
        let server = MockServer::start().await;
        let big = format!(
            "<html><body><p>{}</p></body></html>",
            "word ".repeat(20_000)
        );
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(big, "text/html"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetchConfig {
            max_body_bytes: 4096,
            retry: RetryConfig {
                max_retries: 0,
                backoff: vec![],
            },
            ..FetchConfig::default()
        })
        .expect("client builds");

        let url = Url::parse(&format!("{}/big", server.uri())).expect("valid URL");
        let result = fetcher.fetch(&url).await;
        assert!(result.is_success());
        assert_eq!(result.bytes_downloaded, 4096);
    }

    #[test]
    fn decodes_latin1_when_advertised() {
        let bytes = [0x63u8, 0x61, 0x66, 0xE9]; // "café" in ISO-8859-1
        assert_eq!(decode_body(&bytes, Some("iso-8859-1")), "café");
    }

    #[test]
    fn bom_wins_over_missing_charset() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("hello".as_bytes());
        assert_eq!(decode_body(&bytes, None), "hello");
    }
}
