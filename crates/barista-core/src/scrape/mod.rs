//! Scraping of the retailer's public pages
//!
//! `ProductSource` and `OutletSource` are what the index and the outlet store
//! are rebuilt from. `HttpScraper` implements both by fetching the configured
//! pages; parsing is done by pure functions over the page HTML.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ScraperSettings;
use crate::errors::AgentError;
use crate::outlets::OutletRecord;

pub mod html;
pub mod outlets;
pub mod products;

pub use outlets::parse_outlets;
pub use products::parse_products;

#[async_trait]
pub trait ProductSource: Send + Sync {
    /// One text document per listed product.
    async fn fetch_products(&self) -> Result<Vec<String>, AgentError>;
}

#[async_trait]
pub trait OutletSource: Send + Sync {
    async fn fetch_outlets(&self) -> Result<Vec<OutletRecord>, AgentError>;
}

pub struct HttpScraper {
    client: reqwest::Client,
    products_url: String,
    outlets_url: String,
    timeout_secs: u64,
}

impl HttpScraper {
    pub fn new(settings: &ScraperSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            products_url: settings.products_url.clone(),
            outlets_url: settings.outlets_url.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, AgentError> {
        log::info!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.fetch_error(url, e))?;

        response.text().await.map_err(|e| self.fetch_error(url, e))
    }

    fn fetch_error(&self, url: &str, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::Timeout {
                operation: format!("fetching {}", url),
                seconds: self.timeout_secs,
            }
        } else {
            AgentError::ScrapeFailure(format!("Failed to fetch {}: {}", url, err))
        }
    }
}

#[async_trait]
impl ProductSource for HttpScraper {
    async fn fetch_products(&self) -> Result<Vec<String>, AgentError> {
        let page = self.fetch_page(&self.products_url).await?;
        let products = parse_products(&page);
        if products.is_empty() {
            log::warn!(
                "No products found on {}; the page markup may have changed",
                self.products_url
            );
        } else {
            log::info!("Scraped {} products", products.len());
        }
        Ok(products)
    }
}

#[async_trait]
impl OutletSource for HttpScraper {
    async fn fetch_outlets(&self) -> Result<Vec<OutletRecord>, AgentError> {
        let page = self.fetch_page(&self.outlets_url).await?;
        let outlets = parse_outlets(&page);
        if outlets.is_empty() {
            log::warn!(
                "No outlets found on {}; the page markup may have changed",
                self.outlets_url
            );
        } else {
            log::info!("Scraped {} outlets", outlets.len());
        }
        Ok(outlets)
    }
}
