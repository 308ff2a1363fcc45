use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;

/// Result of fetching one page. Timeouts are split out because the crawl
/// controller treats them differently from other failures.
#[derive(Debug)]
pub enum FetchOutcome {
    Success(String),
    Timeout(String),
    Failed(String),
}

/// Seam between the controllers and the network. Scripted implementations
/// stand in for the site in tests.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(&self, url: &str) -> impl std::future::Future<Output = FetchOutcome> + Send;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, url: &str) -> impl std::future::Future<Output = FetchOutcome> + Send {
        async move {
            let response = match self.client.get(url).send().await {
                Ok(r) => r,
                Err(e) if e.is_timeout() => return FetchOutcome::Timeout(url.to_string()),
                Err(e) => return FetchOutcome::Failed(e.to_string()),
            };
            let response = match response.error_for_status() {
                Ok(r) => r,
                Err(e) => return FetchOutcome::Failed(e.to_string()),
            };
            match response.text().await {
                Ok(body) => FetchOutcome::Success(body),
                Err(e) if e.is_timeout() => FetchOutcome::Timeout(url.to_string()),
                Err(e) => FetchOutcome::Failed(e.to_string()),
            }
        }
    }
}

/// Query URL for one word's translation page (English to Russian, Russian
/// interface).
pub fn translation_url(host: &str, word: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &format!("{}/m.exe", host.trim_end_matches('/')),
        [
            ("CL", "1"),
            ("s", word),
            ("l1", "1"),
            ("l2", "2"),
            ("SHL", "2"),
        ],
    )
    .with_context(|| format!("Bad host {}", host))?;
    Ok(url.into())
}

/// URL of the sub-dictionary catalog page.
pub fn catalog_url(host: &str) -> String {
    format!("{}/m.exe?CL=1&s&l1=1&l2=2&SHL=2", host.trim_end_matches('/'))
}

/// Resolve a site-relative link against the host.
pub fn resolve(host: &str, link: &str) -> Result<String> {
    let base = Url::parse(host).with_context(|| format!("Bad host {}", host))?;
    let url = base
        .join(link)
        .with_context(|| format!("Bad link {}", link))?;
    Ok(url.into())
}
