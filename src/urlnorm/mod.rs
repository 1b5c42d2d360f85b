//! URL normalization for cache-key stability.
//!
//! Every submission is canonicalized into a [`NormalizedUrl`] before the
//! engine looks at it: scheme validation, host lower-casing, default-port and
//! fragment removal, deterministic query ordering, and trailing-slash
//! stripping. Two spellings of the same resource always produce the same
//! cache key, while the originally-submitted form is retained for the
//! actual network fetch.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

/// Errors produced while validating and normalizing a submitted URL.
///
/// All variants surface to submitters as a client input error; none of them
/// creates a job or a cache entry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    /// Input was empty or whitespace-only
    #[error("URL cannot be empty")]
    Empty,

    /// Input is not a well-formed absolute URL
    #[error("invalid URL: {0}")]
    Invalid(String),

    /// URL parsed but uses a scheme other than http/https
    #[error("disallowed scheme: {0}")]
    DisallowedScheme(String),

    /// URL parsed but has no host component
    #[error("URL has no host")]
    MissingHost,
}

/// An immutable, cheaply-cloneable normalized URL.
///
/// The parsed canonical [`Url`] is shared via `Arc`, so clones are pointer
/// copies. Equality and hashing are defined on the canonical key, which
/// makes `NormalizedUrl` directly usable as a dedup-cache key.
#[derive(Clone, Debug)]
pub struct NormalizedUrl {
    key: Arc<str>,
    fetch_url: Arc<str>,
    url: Arc<Url>,
}

impl NormalizedUrl {
    /// Parse and normalize a raw URL string.
    ///
    /// Scheme-less input (`example.com`) is accepted and treated as
    /// `http://example.com`. Anything that is not absolute http/https after
    /// that is rejected.
    ///
    /// # Errors
    ///
    /// Returns a [`UrlError`] when the input is empty, unparseable, uses a
    /// disallowed scheme, or has no host.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(UrlError::Empty);
        }

        // Scheme-less submissions are common; assume http like browsers do.
        // Inputs that already carry any scheme are left alone so that e.g.
        // ftp:// fails the scheme check below instead of being mangled.
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        let parsed = Url::parse(&with_scheme).map_err(|e| UrlError::Invalid(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::DisallowedScheme(other.to_string())),
        }
        if parsed.host_str().is_none() {
            return Err(UrlError::MissingHost);
        }

        let canonical = canonicalize(&parsed);
        let key: Arc<str> = Arc::from(canonical.as_str());
        let fetch_url: Arc<str> = Arc::from(parsed.as_str());

        Ok(Self {
            key,
            fetch_url,
            url: Arc::new(canonical),
        })
    }

    /// The canonical cache key for this URL.
    ///
    /// Stable across query-parameter ordering, fragments, default ports,
    /// host casing, and trailing slashes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The URL to use for the actual network fetch.
    ///
    /// This preserves the submitter's query ordering and fragment; only the
    /// implied `http://` scheme is added for scheme-less input.
    #[must_use]
    pub fn fetch_url(&self) -> &str {
        &self.fetch_url
    }

    #[must_use]
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Access the parsed canonical [`Url`].
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

/// Build the canonical form of an already-validated URL.
///
/// The `url` crate has lower-cased the host and dropped default ports during
/// parsing; this adds fragment removal, query sorting, and trailing-slash
/// stripping on non-root paths.
fn canonicalize(parsed: &Url) -> Url {
    let mut url = parsed.clone();
    url.set_fragment(None);

    // Deterministic query order: sort pairs by (key, value).
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        let sorted = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    url::form_urlencoded::byte_serialize(k.as_bytes()).collect::<String>()
                } else {
                    format!(
                        "{}={}",
                        url::form_urlencoded::byte_serialize(k.as_bytes()).collect::<String>(),
                        url::form_urlencoded::byte_serialize(v.as_bytes()).collect::<String>()
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&sorted));
    }

    // "/about/" and "/about" are the same resource for our purposes.
    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    url
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl PartialEq for NormalizedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for NormalizedUrl {}

impl Hash for NormalizedUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl FromStr for NormalizedUrl {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for NormalizedUrl {
    type Error = UrlError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NormalizedUrl {
    type Error = UrlError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        &self.key
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fetch_url)
    }
}

impl<'de> Deserialize<'de> for NormalizedUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(D::Error::custom)
    }
}
