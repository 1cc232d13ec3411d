//! Web page content for the web panel texture

use async_trait::async_trait;

use anchorstage_config::WebConfig;

use crate::error::Result;
#[cfg(feature = "web-fetch")]
use crate::error::StageError;

/// A loaded page, ready to be rendered into a panel texture
#[derive(Debug, Clone, PartialEq)]
pub struct WebPage {
    pub url: String,
    pub title: Option<String>,
    pub body: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

#[async_trait]
pub trait WebContentSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<WebPage>;
}

/// Serves a fixed placeholder page without touching the network
#[derive(Debug, Clone)]
pub struct StaticWebSource {
    viewport_width: u32,
    viewport_height: u32,
}

impl StaticWebSource {
    pub fn new(config: &WebConfig) -> Self {
        Self {
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
        }
    }
}

impl Default for StaticWebSource {
    fn default() -> Self {
        Self::new(&WebConfig::default())
    }
}

#[async_trait]
impl WebContentSource for StaticWebSource {
    async fn fetch(&self, url: &str) -> Result<WebPage> {
        Ok(WebPage {
            url: url.to_string(),
            title: Some(url.rsplit('/').next().unwrap_or(url).replace('_', " ")),
            body: String::new(),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
        })
    }
}

/// Fetches the page over HTTP with a single GET
#[cfg(feature = "web-fetch")]
#[derive(Debug, Clone)]
pub struct HttpWebSource {
    client: reqwest::Client,
    viewport_width: u32,
    viewport_height: u32,
}

#[cfg(feature = "web-fetch")]
impl HttpWebSource {
    pub fn new(config: &WebConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StageError::Web(e.to_string()))?;
        Ok(Self {
            client,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
        })
    }
}

#[cfg(feature = "web-fetch")]
#[async_trait]
impl WebContentSource for HttpWebSource {
    async fn fetch(&self, url: &str) -> Result<WebPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::Web(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Web(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StageError::Web(format!("Reading {} failed: {}", url, e)))?;

        Ok(WebPage {
            url: url.to_string(),
            title: extract_title(&body),
            body,
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
        })
    }
}

/// Text of the first `<title>` element, if any
#[cfg(feature = "web-fetch")]
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}
