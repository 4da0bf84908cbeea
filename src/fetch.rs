//! Listing-page fetching.
//!
//! The pipeline only sees the [`PageFetcher`] trait: give it a URL, get back
//! decoded markup or a classified [`FetchError`]. [`HttpFetcher`] is the
//! production implementation on top of `reqwest`.
//!
//! # Request Identity
//!
//! Many corporate sites reject obvious bots, so requests carry a desktop
//! browser User-Agent and `Accept` headers. Certificate verification can be
//! switched off per deployment for sites with broken chains.
//!
//! # Body Decoding
//!
//! Japanese listing pages are often served as Shift_JIS or EUC-JP with the
//! charset only declared in a `<meta>` tag. The charset is taken from, in
//! order: the `Content-Type` header, `<meta charset>`, `<meta http-equiv>`,
//! and finally byte-level sniffing.

use crate::models::SkipCategory;
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Desktop browser identity sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static CHARSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static META_HTTP_EQUIV_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s+[^>]*?http-equiv\s*=\s*["']?content-type["']?[^>]*?content\s*=\s*["']?[^"'>]*?charset\s*=\s*([^"'\s;/>]+)"#).unwrap()
});

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("forbidden (HTTP 403)")]
    Forbidden,

    #[error("http error {status}")]
    Http { status: u16 },

    #[error("tls error: {0}")]
    Tls(String),

    #[error("request timeout")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl FetchError {
    /// Skip-log category for this failure.
    pub fn category(&self) -> SkipCategory {
        match self {
            Self::Forbidden => SkipCategory::Forbidden,
            Self::Http { status } => SkipCategory::HttpError(*status),
            Self::Tls(_) => SkipCategory::TlsError,
            Self::Timeout => SkipCategory::Timeout,
            Self::InvalidUrl(_) | Self::Network(_) => SkipCategory::NetworkError,
            Self::Unexpected(_) => SkipCategory::Unexpected,
        }
    }

    /// Extra text for the skip log; `None` when the category says it all.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Forbidden | Self::Http { .. } | Self::Timeout => None,
            other => Some(other.to_string()),
        }
    }

    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::FORBIDDEN {
            Self::Forbidden
        } else {
            Self::Http {
                status: status.as_u16(),
            }
        }
    }

    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else if looks_like_tls(&err) {
            Self::Tls(error_chain(&err))
        } else if err.is_connect() || err.is_request() || err.is_redirect() || err.is_body() || err.is_decode() {
            Self::Network(error_chain(&err))
        } else {
            Self::Unexpected(error_chain(&err))
        }
    }
}

/// Anything that can turn a URL into page markup.
pub trait PageFetcher {
    /// Fetch and decode the page at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Request settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    /// When false, invalid or self-signed certificates are accepted.
    pub verify_tls: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            verify_tls: true,
        }
    }
}

/// `reqwest`-backed [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/rss+xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .user_agent(options.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(!options.verify_tls)
            .build()
            .map_err(|e| FetchError::Unexpected(error_chain(&e)))?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url)?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        let body = response
            .bytes()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let encoding = detect_encoding(&content_type, &body);
        debug!(bytes = body.len(), encoding = encoding.name(), "Fetched page");
        Ok(decode_body(&body, encoding))
    }
}

/// Pick the body's character encoding.
pub fn detect_encoding(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = label_from(&CHARSET_REGEX, content_type) {
        return encoding;
    }

    let head = &body[..body.len().min(4096)];
    let head_str = String::from_utf8_lossy(head);
    if let Some(encoding) = label_from(&META_CHARSET_REGEX, &head_str) {
        return encoding;
    }
    if let Some(encoding) = label_from(&META_HTTP_EQUIV_REGEX, &head_str) {
        return encoding;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, head.len() == body.len());
    detector.guess(None, true)
}

fn label_from(pattern: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = pattern.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes())
}

/// Decode with replacement characters for malformed sequences, stripping a BOM.
pub fn decode_body(body: &[u8], encoding: &'static Encoding) -> String {
    let (decoded, _used, _had_errors) = encoding.decode(body);
    decoded.into_owned()
}

/// Certificate and handshake failures only show up in the source chain;
/// the top-level message is skipped because it embeds the URL.
fn looks_like_tls(err: &reqwest::Error) -> bool {
    let Some(source) = err.source() else {
        return false;
    };
    let chain = error_chain(source).to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| chain.contains(needle))
}

/// The error and all of its sources joined into one line.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
