//! Loading pages for the page host.
//!
//! Uses reqwest for fetching and scraper for the page title.

use reqwest::Client;
use scraper::{Html, Selector};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// User-Agent string identifying this client
const USER_AGENT: &str = concat!(
    "precis/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/cladam/precis)"
);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("failed to fetch URL: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to read file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("cannot turn path into a URL: {0}")]
    InvalidPath(String),
}

/// A loaded page, ready to be opened in a tab
#[derive(Debug, Clone)]
pub struct Page {
    /// The page URL (`file://` for local files)
    pub url: String,
    /// Page title
    pub title: Option<String>,
    /// Raw HTML document
    pub html: String,
}

impl Page {
    fn new(url: String, html: String) -> Self {
        let title = extract_title(&html);
        Self { url, title, html }
    }
}

/// Create a configured HTTP client for page fetching
fn create_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Fetch a page over HTTP
pub async fn fetch_page(url: &str, timeout: Duration) -> Result<Page, FetchError> {
    let client = create_client(timeout)?;

    debug!("Fetching {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    // Redirects may have moved us; the tab shows where we ended up
    let final_url = response.url().to_string();
    let html = response.text().await?;
    Ok(Page::new(final_url, html))
}

/// Read a saved HTML file from disk
pub fn load_file(path: &Path) -> Result<Page, FetchError> {
    let html = std::fs::read_to_string(path)?;
    let absolute = std::fs::canonicalize(path)?;
    let url = Url::from_file_path(&absolute)
        .map_err(|_| FetchError::InvalidPath(absolute.display().to_string()))?;
    Ok(Page::new(url.to_string(), html))
}

/// Extract the page title from <title> or <h1>
fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for tag in ["title", "h1"] {
        let selector = Selector::parse(tag).expect("static selector");
        if let Some(element) = document.select(&selector).next() {
            let title = element.text().collect::<Vec<_>>().join(" ");
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
            if !title.is_empty() {
                return Some(title);
            }
        }
    }

    None
}
