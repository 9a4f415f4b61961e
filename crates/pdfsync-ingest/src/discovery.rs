//! Source discovery
//!
//! Finds the list of document URLs to process. The default implementation scrapes an
//! index page for elements matching a selector and takes the `href` of each element's
//! first child link.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{IngestError, Result};

/// Produces the ordered list of source URLs for one run
#[async_trait]
pub trait SourceDiscovery: Send + Sync {
    async fn discover(&self) -> Result<Vec<String>>;
}

/// Scrapes report links from an HTML index page
pub struct HtmlLinkDiscovery {
    client: Client,
    index_url: String,
    selector: String,
}

impl HtmlLinkDiscovery {
    pub fn new(client: Client, index_url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            client,
            index_url: index_url.into(),
            selector: selector.into(),
        }
    }

    /// Fetch the index page HTML
    async fn fetch_index(&self) -> Result<String> {
        debug!(url = %self.index_url, "Fetching index page");

        let response = self.client.get(&self.index_url).send().await?;

        if !response.status().is_success() {
            return Err(IngestError::Discovery(format!(
                "{} returned HTTP {}",
                self.index_url,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl SourceDiscovery for HtmlLinkDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        let html = self.fetch_index().await?;
        let urls = extract_links(&html, &self.index_url, &self.selector)?;

        info!(count = urls.len(), url = %self.index_url, "Discovered source documents");
        Ok(urls)
    }
}

/// A fixed list of URLs, for explicit `--url` runs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    urls: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl SourceDiscovery for StaticDiscovery {
    async fn discover(&self) -> Result<Vec<String>> {
        Ok(self.urls.clone())
    }
}

/// Pull link targets out of `html` in document order.
///
/// Each element matching `selector` contributes the `href` of its first child element.
/// Relative links are resolved against `base_url`.
pub fn extract_links(html: &str, base_url: &str, selector: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(selector)
        .map_err(|e| IngestError::Config(format!("Invalid link selector '{}': {}", selector, e)))?;
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    let mut urls = Vec::new();
    for item in document.select(&selector) {
        let Some(href) = first_child_href(item) else {
            warn!(html = %item.html(), "Link item without an href, ignoring");
            continue;
        };

        let resolved = match &base {
            Some(base) => match base.join(href) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    warn!(href = %href, error = %e, "Unresolvable link, ignoring");
                    continue;
                },
            },
            None => href.to_string(),
        };

        debug!(url = %resolved, "Found source link");
        urls.push(resolved);
    }

    Ok(urls)
}

fn first_child_href(item: ElementRef<'_>) -> Option<&str> {
    item.children()
        .find_map(ElementRef::wrap)
        .and_then(|child| child.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
}
