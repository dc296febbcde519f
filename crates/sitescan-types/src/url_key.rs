use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Normalized page identity.
///
/// Two URLs refer to the same page iff their keys are equal. The key form is
/// `scheme://host[:port]path[?query]` with the hostname lowercased, a `www.`
/// prefix stripped, default ports elided, the trailing slash on the path
/// removed, the fragment dropped, and query parameters sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlKey(String);

impl UrlKey {
    /// Normalize a parsed URL into its key form.
    pub fn from_url(url: &Url) -> Self {
        let scheme = url.scheme().to_ascii_lowercase();

        let host = url
            .host_str()
            .map(|h| {
                let lower = h.to_ascii_lowercase();
                lower
                    .strip_prefix("www.")
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| rest.to_string())
                    .unwrap_or(lower)
            })
            .unwrap_or_default();

        let port = match (url.port(), scheme.as_str()) {
            (Some(80), "http") | (Some(443), "https") | (None, _) => String::new(),
            (Some(p), _) => format!(":{}", p),
        };

        let path = url.path().trim_end_matches('/').to_string();

        let query = {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if pairs.is_empty() {
                String::new()
            } else {
                pairs.sort();
                let joined = pairs
                    .iter()
                    .map(|(k, v)| {
                        if v.is_empty() {
                            k.clone()
                        } else {
                            format!("{}={}", k, v)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("&");
                format!("?{}", joined)
            }
        };

        UrlKey(format!("{}://{}{}{}{}", scheme, host, port, path, query))
    }

    /// Parse and normalize in one step.
    pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
        Ok(Self::from_url(&Url::parse(raw)?))
    }

    /// The normalized host portion of the key (no `www.`, lowercased).
    pub fn host(&self) -> &str {
        let rest = self.0.split("://").nth(1).unwrap_or("");
        let end = rest
            .find(|c| c == '/' || c == '?' || c == ':')
            .unwrap_or(rest.len());
        &rest[..end]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `other` is the same host or a subdomain of this key's host.
    pub fn host_covers(&self, other: &UrlKey) -> bool {
        let mine = self.host();
        let theirs = other.host();
        theirs == mine || theirs.ends_with(&format!(".{}", mine))
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> UrlKey {
        UrlKey::parse(raw).expect("valid URL")
    }

    #[test]
    fn www_prefix_and_case_are_ignored() {
        assert_eq!(key("https://WWW.Example.com/About"), key("https://example.com/About"));
    }

    #[test]
    fn trailing_slash_and_fragment_are_dropped() {
        assert_eq!(key("https://example.com/services/"), key("https://example.com/services"));
        assert_eq!(key("https://example.com/a#section"), key("https://example.com/a"));
    }

    #[test]
    fn default_ports_are_elided() {
        assert_eq!(key("https://example.com:443/x"), key("https://example.com/x"));
        assert_eq!(key("http://example.com:80/x"), key("http://example.com/x"));
        assert_ne!(key("http://example.com:8080/x"), key("http://example.com/x"));
    }

    #[test]
    fn query_params_are_sorted() {
        assert_eq!(key("https://example.com/p?b=2&a=1"), key("https://example.com/p?a=1&b=2"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = key("https://WWW.Example.com:443/Services/?b=2&a=1#top");
        let twice = UrlKey::parse(once.as_str()).expect("key re-parses");
        assert_eq!(once, twice);
    }

    #[test]
    fn host_and_subdomain_scope() {
        let seed = key("https://example.com/");
        assert_eq!(seed.host(), "example.com");
        assert!(seed.host_covers(&key("https://blog.example.com/post")));
        assert!(seed.host_covers(&key("https://www.example.com/")));
        assert!(!seed.host_covers(&key("https://notexample.com/")));
    }
}
