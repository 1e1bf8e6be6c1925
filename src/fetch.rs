use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue, USER_AGENT};

use crate::error::ScrapeError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Blocking page and asset retrieval.
pub trait PageFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, ScrapeError>;

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        (**self).fetch_text(url)
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        (**self).fetch_bytes(url)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub user_agent: String,
    pub timeout: Duration,
    /// Pre-rendered `Cookie` header value (`a=1; b=2`).
    pub cookie_header: Option<String>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: Duration::from_secs(30),
            cookie_header: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&options.user_agent).context("user agent header value")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        if let Some(cookie) = options.cookie_header.as_deref() {
            let mut value = HeaderValue::from_str(cookie).context("cookie header value")?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::blocking::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;

        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ScrapeError> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| ScrapeError::Transport {
                url: url.to_owned(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        self.get(url)?
            .text()
            .map_err(|source| ScrapeError::Transport {
                url: url.to_owned(),
                source,
            })
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        self.get(url)?
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|source| ScrapeError::Transport {
                url: url.to_owned(),
                source,
            })
    }
}
