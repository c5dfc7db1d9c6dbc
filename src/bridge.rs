//! Messaging between the controller and extractors attached to pages.
//!
//! A [`PageHost`] owns tabs. Injecting the extractor into a tab spawns an
//! isolated listener task for that page; requests travel to it over a bounded
//! channel and each one is answered through its own `oneshot` reply. Every
//! request resolves or rejects within the configured timeout.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use url::Url;

use crate::extractor::{self, Envelope, ExtractedContent, ExtractorRequest};

/// Capacity of each extractor's inbound channel
const INBOX_CAPACITY: usize = 16;

/// URL schemes an extractor may never be attached to
const RESTRICTED_SCHEMES: &[&str] = &[
    "about",
    "chrome",
    "chrome-extension",
    "chrome-search",
    "devtools",
    "edge",
    "view-source",
];

/// Identifier of a tab inside a page host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("no such tab: {0}")]
    UnknownTab(TabId),
    #[error("cannot access contents of restricted page: {0}")]
    Restricted(String),
    #[error("cannot access contents of page with invalid URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no active tab")]
    NoActiveTab,
    #[error("could not establish connection: no extractor is listening in {0}")]
    NoListener(TabId),
    #[error("message transport failed: {0}")]
    Transport(String),
    #[error("extractor did not answer within {0:?}")]
    Timeout(Duration),
}

/// The environment hosting pages the controller can act on
#[async_trait]
pub trait PageHost: Send + Sync {
    /// The tab the user is looking at
    async fn active_tab(&self) -> Result<TabId, BridgeError>;

    /// Attach the extractor to a tab's page
    async fn inject_extractor(&self, tab: TabId) -> Result<(), InjectionError>;

    /// Ask the tab's extractor for the page text; a single attempt
    async fn request_content(&self, tab: TabId) -> Result<ExtractedContent, BridgeError>;
}

struct Tab {
    url: String,
    html: String,
    listener: Option<mpsc::Sender<Envelope>>,
}

/// In-process page host holding documents loaded by the caller
pub struct LocalPageHost {
    tabs: Mutex<HashMap<TabId, Tab>>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicU32,
    timeout: Duration,
}

impl LocalPageHost {
    /// Create a host whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            tabs: Mutex::new(HashMap::new()),
            active: Mutex::new(None),
            next_id: AtomicU32::new(1),
            timeout,
        }
    }

    /// Load a document into a new tab and make it the active one
    pub fn open_tab(&self, url: impl Into<String>, html: impl Into<String>) -> TabId {
        let id = TabId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let tab = Tab {
            url: url.into(),
            html: html.into(),
            listener: None,
        };
        debug!("Opened {} at {}", id, tab.url);
        self.tabs.lock().insert(id, tab);
        *self.active.lock() = Some(id);
        id
    }

    /// Switch the active tab; returns false for an unknown tab
    #[cfg(test)]
    fn activate(&self, tab: TabId) -> bool {
        if !self.tabs.lock().contains_key(&tab) {
            return false;
        }
        *self.active.lock() = Some(tab);
        true
    }

    /// Close a tab, stopping its extractor
    #[cfg(test)]
    fn close_tab(&self, tab: TabId) {
        self.tabs.lock().remove(&tab);
        let mut active = self.active.lock();
        if *active == Some(tab) {
            *active = None;
        }
    }

    /// Whether an extractor is currently listening in the tab
    #[cfg(test)]
    fn has_listener(&self, tab: TabId) -> bool {
        self.tabs
            .lock()
            .get(&tab)
            .and_then(|t| t.listener.as_ref())
            .is_some_and(|sender| !sender.is_closed())
    }

    #[cfg(test)]
    fn attach_listener(&self, tab: TabId, sender: mpsc::Sender<Envelope>) {
        if let Some(t) = self.tabs.lock().get_mut(&tab) {
            t.listener = Some(sender);
        }
    }

    async fn send(
        &self,
        sender: mpsc::Sender<Envelope>,
        tab: TabId,
        request: ExtractorRequest,
    ) -> Result<ExtractedContent, BridgeError> {
        let (reply, response) = oneshot::channel();
        sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| BridgeError::NoListener(tab))?;

        response.await.map_err(|_| {
            BridgeError::Transport("the message port closed before a response was received".into())
        })
    }
}

#[async_trait]
impl PageHost for LocalPageHost {
    async fn active_tab(&self) -> Result<TabId, BridgeError> {
        (*self.active.lock()).ok_or(BridgeError::NoActiveTab)
    }

    async fn inject_extractor(&self, tab: TabId) -> Result<(), InjectionError> {
        let mut tabs = self.tabs.lock();
        let entry = tabs.get_mut(&tab).ok_or(InjectionError::UnknownTab(tab))?;
        check_injectable(&entry.url)?;

        if entry.listener.as_ref().is_some_and(|s| !s.is_closed()) {
            debug!("Extractor already attached to {}", tab);
            return Ok(());
        }

        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        tokio::spawn(extractor::serve(entry.html.clone(), inbox));
        entry.listener = Some(sender);
        debug!("Extractor attached to {} ({})", tab, entry.url);
        Ok(())
    }

    async fn request_content(&self, tab: TabId) -> Result<ExtractedContent, BridgeError> {
        let sender = self
            .tabs
            .lock()
            .get(&tab)
            .and_then(|t| t.listener.clone())
            .ok_or(BridgeError::NoListener(tab))?;

        debug!("Sending GET_ARTICLE_TEXT to {}", tab);
        let request = self.send(sender, tab, ExtractorRequest::GetArticleText);
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Extractor in {} did not answer within {:?}", tab, self.timeout);
                Err(BridgeError::Timeout(self.timeout))
            }
        }
    }
}

/// Reject pages the extractor is not allowed to run in
fn check_injectable(raw: &str) -> Result<(), InjectionError> {
    let url = Url::parse(raw).map_err(|_| InjectionError::InvalidUrl(raw.to_string()))?;

    if RESTRICTED_SCHEMES.contains(&url.scheme()) {
        return Err(InjectionError::Restricted(raw.to_string()));
    }

    let web_store = match url.host_str() {
        Some("chromewebstore.google.com") => true,
        Some("chrome.google.com") => url.path().starts_with("/webstore"),
        _ => false,
    };
    if web_store {
        return Err(InjectionError::Restricted(raw.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionFailure;

    const ARTICLE: &str = "<html><body><article>Hello world</article></body></html>";

    fn host() -> LocalPageHost {
        LocalPageHost::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn injected_extractor_answers_requests() {
        let host = host();
        let tab = host.open_tab("https://example.com/post", ARTICLE);

        host.inject_extractor(tab).await.unwrap();
        let content = host.request_content(tab).await.unwrap();
        assert_eq!(content, ExtractedContent::text("Hello world"));
    }

    #[tokio::test]
    async fn request_without_listener_fails_fast() {
        let host = host();
        let tab = host.open_tab("https://example.com", ARTICLE);

        let err = host.request_content(tab).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoListener(t) if t == tab));
    }

    #[tokio::test]
    async fn request_to_closed_listener_is_no_listener() {
        let host = host();
        let tab = host.open_tab("https://example.com", ARTICLE);
        let (sender, inbox) = mpsc::channel(1);
        host.attach_listener(tab, sender);
        drop(inbox);

        let err = host.request_content(tab).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoListener(_)));
    }

    #[tokio::test]
    async fn dropped_reply_is_a_transport_error() {
        let host = host();
        let tab = host.open_tab("https://example.com", ARTICLE);
        let (sender, mut inbox) = mpsc::channel::<Envelope>(1);
        host.attach_listener(tab, sender);
        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                drop(envelope.reply);
            }
        });

        let err = host.request_content(tab).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_listener_times_out() {
        let host = host();
        let tab = host.open_tab("https://example.com", ARTICLE);
        let (sender, mut inbox) = mpsc::channel::<Envelope>(1);
        host.attach_listener(tab, sender);
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(envelope) = inbox.recv().await {
                held.push(envelope);
            }
        });

        let err = host.request_content(tab).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(d) if d == Duration::from_millis(200)));
        holder.abort();
    }

    #[tokio::test]
    async fn restricted_pages_reject_injection() {
        let host = host();
        for url in [
            "chrome://settings",
            "about:blank",
            "chrome-extension://abc/popup.html",
            "https://chromewebstore.google.com/detail/xyz",
            "https://chrome.google.com/webstore/category/extensions",
        ] {
            let tab = host.open_tab(url, ARTICLE);
            let err = host.inject_extractor(tab).await.unwrap_err();
            assert!(matches!(err, InjectionError::Restricted(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn injection_into_unknown_or_invalid_tab_fails() {
        let host = host();
        let tab = host.open_tab("https://example.com", ARTICLE);
        host.close_tab(tab);
        assert!(matches!(
            host.inject_extractor(tab).await,
            Err(InjectionError::UnknownTab(_))
        ));
        assert!(matches!(host.active_tab().await, Err(BridgeError::NoActiveTab)));

        let tab = host.open_tab("not a url", ARTICLE);
        assert!(matches!(
            host.inject_extractor(tab).await,
            Err(InjectionError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn repeated_injection_keeps_one_listener() {
        let host = host();
        let tab = host.open_tab("file:///tmp/page.html", "<div>empty</div>");
        host.inject_extractor(tab).await.unwrap();
        host.inject_extractor(tab).await.unwrap();
        assert!(host.has_listener(tab));

        let content = host.request_content(tab).await.unwrap();
        assert_eq!(content, ExtractedContent::failed(ExtractionFailure::NotFound));
    }

    #[tokio::test]
    async fn newest_tab_is_active() {
        let host = host();
        let first = host.open_tab("https://a.example", ARTICLE);
        let second = host.open_tab("https://b.example", ARTICLE);
        assert_eq!(host.active_tab().await.unwrap(), second);
        assert!(host.activate(first));
        assert_eq!(host.active_tab().await.unwrap(), first);
    }
}
