//! Document retrieval.
//!
//! A [`DocumentFetcher`] performs exactly one network call per invocation and
//! never retries; the aggregator owns the retry policy. Payloads are decoded
//! into a [`Document`] according to the requested [`DocumentKind`].
//!
//! Features of [`HttpFetcher`]:
//! - Per-host token-bucket rate limiting via [`governor`].
//! - `Accept-Language` built from the request's language and country.
//! - Cancellation through a [`CancellationToken`]: a cancelled token aborts
//!   the in-flight request.
//! - XML and JSON payloads that fail to parse as UTF-8 are re-read as
//!   ISO-8859-1 and then US-ASCII before a parse failure is declared.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use metaforge_common::{Result, ScrapeError};
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::xml::XmlElement;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUESTS_PER_SECOND: u32 = 4;
const DEFAULT_USER_AGENT: &str = concat!("metaforge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// How the payload of a fetch should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Xml,
    Json,
    Text,
}

/// What to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSpec {
    pub url: String,
    /// ISO-639-1 language code, e.g. `"en"`.
    pub language: String,
    /// ISO-3166-1 alpha-2 country code, e.g. `"US"`.
    pub country: String,
    pub kind: DocumentKind,
}

impl FetchSpec {
    pub fn new(url: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            url: url.into(),
            language: "en".to_string(),
            country: "US".to_string(),
            kind,
        }
    }

    pub fn with_locale(mut self, language: &str, country: &str) -> Self {
        self.language = language.to_string();
        self.country = country.to_string();
        self
    }

    /// Value for the `Accept-Language` header, e.g. `en-US,en;q=0.9`.
    pub fn accept_language(&self) -> String {
        let language = self.language.to_ascii_lowercase();
        if self.country.is_empty() {
            language
        } else {
            format!(
                "{language}-{},{language};q=0.9",
                self.country.to_ascii_uppercase()
            )
        }
    }
}

/// A fetched and decoded payload.
///
/// HTML stays as text: the DOM type of the HTML parser is not `Send`, so
/// parsers build it synchronously when they need it.
#[derive(Debug, Clone)]
pub enum Document {
    Html(String),
    Xml(XmlElement),
    Json(serde_json::Value),
    Text(String),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Html(_) => DocumentKind::Html,
            Self::Xml(_) => DocumentKind::Xml,
            Self::Json(_) => DocumentKind::Json,
            Self::Text(_) => DocumentKind::Text,
        }
    }

    pub fn as_html(&self, source_id: &str) -> Result<&str> {
        match self {
            Self::Html(s) | Self::Text(s) => Ok(s),
            other => Err(ScrapeError::parse(
                source_id,
                format!("expected an HTML document, got {:?}", other.kind()),
            )),
        }
    }

    pub fn as_xml(&self, source_id: &str) -> Result<&XmlElement> {
        match self {
            Self::Xml(root) => Ok(root),
            other => Err(ScrapeError::parse(
                source_id,
                format!("expected an XML document, got {:?}", other.kind()),
            )),
        }
    }

    pub fn as_json(&self, source_id: &str) -> Result<&serde_json::Value> {
        match self {
            Self::Json(value) => Ok(value),
            other => Err(ScrapeError::parse(
                source_id,
                format!("expected a JSON document, got {:?}", other.kind()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

const CHARSET_FALLBACK: [Charset; 3] = [Charset::Utf8, Charset::Latin1, Charset::Ascii];

fn decode_bytes(bytes: &[u8], charset: Charset) -> Option<String> {
    match charset {
        Charset::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
        Charset::Latin1 => Some(bytes.iter().map(|&b| b as char).collect()),
        Charset::Ascii => Some(
            bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
        ),
    }
}

/// Decode a raw payload as `kind`.
///
/// Structured payloads are tried under each charset of the fallback chain in
/// turn; HTML and plain text are decoded leniently and never fail.
pub fn decode_document(url: &str, kind: DocumentKind, bytes: &[u8]) -> Result<Document> {
    match kind {
        DocumentKind::Html => Ok(Document::Html(String::from_utf8_lossy(bytes).into_owned())),
        DocumentKind::Text => Ok(Document::Text(String::from_utf8_lossy(bytes).into_owned())),
        DocumentKind::Xml | DocumentKind::Json => {
            let mut last_error = String::from("empty payload");
            for charset in CHARSET_FALLBACK {
                let Some(text) = decode_bytes(bytes, charset) else {
                    last_error = format!("payload is not valid {charset:?}");
                    continue;
                };
                let parsed = match kind {
                    DocumentKind::Xml => XmlElement::parse(&text)
                        .map(Document::Xml)
                        .map_err(|e| e.to_string()),
                    _ => serde_json::from_str(&text)
                        .map(Document::Json)
                        .map_err(|e| e.to_string()),
                };
                match parsed {
                    Ok(document) => return Ok(document),
                    Err(e) => {
                        debug!(url, charset = ?charset, error = %e, "Payload did not parse, trying next charset");
                        last_error = e;
                    }
                }
            }
            Err(ScrapeError::parse(url, last_error))
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher trait and HTTP implementation
// ---------------------------------------------------------------------------

/// Retrieves one document per call.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, spec: &FetchSpec, cancel: &CancellationToken) -> Result<Document>;
}

/// HTTP fetcher backed by `reqwest`.
///
/// # Examples
///
/// ```no_run
/// use metaforge::metadata::fetcher::HttpFetcher;
///
/// let fetcher = HttpFetcher::new(4).unwrap();
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    rate_limiter: DefaultKeyedRateLimiter<String>,
}

impl HttpFetcher {
    /// Create a fetcher allowing `requests_per_second` per host.
    pub fn new(requests_per_second: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScrapeError::fetch("<client>", e.to_string()))?;

        let rate = NonZeroU32::new(requests_per_second)
            .or(NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND))
            .unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::keyed(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    async fn fetch_inner(&self, spec: &FetchSpec) -> Result<Document> {
        let host = reqwest::Url::parse(&spec.url)
            .map_err(|e| ScrapeError::fetch(&spec.url, format!("invalid URL: {e}")))?
            .host_str()
            .unwrap_or_default()
            .to_string();
        self.rate_limiter.until_key_ready(&host).await;

        debug!(url = %spec.url, kind = ?spec.kind, "Fetching document");

        let resp = self
            .client
            .get(&spec.url)
            .header(ACCEPT_LANGUAGE, spec.accept_language())
            .header(USER_AGENT, DEFAULT_USER_AGENT)
            .send()
            .await
            .map_err(|e| ScrapeError::fetch(&spec.url, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch {
                url: spec.url.clone(),
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ScrapeError::fetch(&spec.url, e.to_string()))?;
        trace!(url = %spec.url, len = bytes.len(), "Received payload");

        decode_document(&spec.url, spec.kind, &bytes)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, spec: &FetchSpec, cancel: &CancellationToken) -> Result<Document> {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(url = %spec.url, "Fetch cancelled");
                Err(ScrapeError::Cancelled)
            }
            result = self.fetch_inner(spec) => result,
        }
    }
}
