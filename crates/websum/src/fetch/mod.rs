//! Page retrieval.
//!
//! [`Fetcher`] is the seam between the controller and the network. The
//! production implementation, [`HttpFetcher`], issues a single GET with
//! browser-like headers, enforces a deadline and a body size cap, and hands
//! back the raw body with its content type. [`normalize`] then turns markup
//! into markdown and leaves everything else alone.

pub mod markdown;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, Stage, WebsumError};

pub use markdown::{html_to_markdown, is_markup};

/// Boxed future returned by [`Fetcher::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<FetchedPage>> + Send + 'a>>;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// A retrieved resource before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Body decoded as UTF-8, invalid sequences replaced.
    pub content: String,
    /// Raw `Content-Type` header value, empty when absent.
    pub content_type: String,
}

impl FetchedPage {
    pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Retrieves a web resource by URL.
///
/// Implementations must report invalid URLs as
/// [`WebsumError::InvalidUrl`] without touching the network.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}

/// Convert markup to markdown; pass any other content type through.
pub fn normalize(page: FetchedPage) -> Result<String> {
    if is_markup(&page.content_type) {
        html_to_markdown(&page.content)
    } else {
        Ok(page.content)
    }
}

/// Parse `url` and require an `http` or `https` scheme.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|_| WebsumError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        _ => Err(WebsumError::InvalidUrl(url.to_string())),
    }
}

// ── HTTP fetcher ───────────────────────────────────────────────────

/// [`Fetcher`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpFetcher {
    pub fn new(
        timeout: Duration,
        max_response_bytes: usize,
    ) -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            timeout,
            max_response_bytes,
        })
    }

    pub fn from_config(config: &Config) -> std::result::Result<Self, reqwest::Error> {
        Self::new(config.fetch_timeout, config.max_response_bytes)
    }

    async fn get(&self, url: &str) -> Result<FetchedPage> {
        let parsed = validate_url(url)?;
        let failed = |reason: String| WebsumError::FetchFailed {
            url: url.to_string(),
            reason,
        };

        let mut resp = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .header(ACCEPT, BROWSER_ACCEPT)
            .header(ACCEPT_LANGUAGE, BROWSER_ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(failed(format!(
                "request failed with status code {}",
                status.as_u16()
            )));
        }

        if let Some(len) = resp.content_length()
            && len > self.max_response_bytes as u64
        {
            return Err(failed(self.too_large()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| self.transport_error(url, e))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(failed(self.too_large()));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            "Fetched {url}: HTTP {status}, {} bytes, content-type {content_type:?}",
            body.len()
        );

        Ok(FetchedPage {
            content: String::from_utf8_lossy(&body).into_owned(),
            content_type,
        })
    }

    fn too_large(&self) -> String {
        format!(
            "response body exceeds maximum size of {} bytes",
            self.max_response_bytes
        )
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> WebsumError {
        if e.is_timeout() {
            WebsumError::Timeout {
                stage: Stage::Fetch,
                after: self.timeout,
            }
        } else {
            WebsumError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(self.get(url))
    }
}
