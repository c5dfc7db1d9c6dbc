//! Readable-text extraction for a loaded page.
//!
//! The extractor runs next to the page document, isolated from the controller.
//! It answers `GET_ARTICLE_TEXT` requests arriving on its inbound channel using
//! two fixed heuristics: the first `<article>` element, or else every `<p>`.

use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Display text for a document with neither an article nor paragraphs
pub const NOT_FOUND_MESSAGE: &str = "No article content found";

/// Reply for a document whose article or paragraphs render to nothing
pub const UNREADABLE_MESSAGE: &str =
    "This webpage does not contain readable article or paragraph content.";

/// Elements whose subtree is never rendered
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start and end their own line when rendered
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Table cells, separated by a tab within their row
const CELL_ELEMENTS: &[&str] = &["td", "th"];

/// Messages the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractorRequest {
    #[serde(rename = "GET_ARTICLE_TEXT")]
    GetArticleText,
}

/// Why no text came back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionFailure {
    /// Neither an article container nor any paragraph exists
    NotFound,
    /// The chosen content rendered to blank text
    Unreadable,
}

/// The extractor's reply to `GET_ARTICLE_TEXT`.
///
/// Serializes to `{"text": ...}` or `{"error": ..., "code": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedContent {
    Text {
        text: String,
    },
    Failed {
        error: String,
        code: ExtractionFailure,
    },
}

impl ExtractedContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn failed(code: ExtractionFailure) -> Self {
        let error = match code {
            ExtractionFailure::NotFound => NOT_FOUND_MESSAGE,
            ExtractionFailure::Unreadable => UNREADABLE_MESSAGE,
        };
        Self::Failed {
            error: error.to_string(),
            code,
        }
    }
}

/// Result of the heuristic chain, before it is turned into a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(String),
    NotFound,
}

/// A request delivered to a running extractor, with its reply slot
#[derive(Debug)]
pub struct Envelope {
    pub request: ExtractorRequest,
    pub reply: oneshot::Sender<ExtractedContent>,
}

/// Extract readable text from an HTML document.
///
/// The first `<article>` wins regardless of any other content; otherwise all
/// `<p>` elements are joined with `\n` in document order.
pub fn extract_article_text(html: &str) -> Extraction {
    let document = Html::parse_document(html);

    let article_selector = Selector::parse("article").expect("static selector");
    if let Some(article) = document.select(&article_selector).next() {
        return Extraction::Found(rendered_text(article));
    }

    let paragraph_selector = Selector::parse("p").expect("static selector");
    let paragraphs: Vec<String> = document
        .select(&paragraph_selector)
        .map(rendered_text)
        .collect();

    if paragraphs.is_empty() {
        Extraction::NotFound
    } else {
        Extraction::Found(paragraphs.join("\n"))
    }
}

/// Answer a single request against the given document
pub fn handle_message(html: &str, request: ExtractorRequest) -> ExtractedContent {
    match request {
        ExtractorRequest::GetArticleText => match extract_article_text(html) {
            Extraction::Found(text) if text.trim().is_empty() => {
                ExtractedContent::failed(ExtractionFailure::Unreadable)
            }
            Extraction::Found(text) => ExtractedContent::Text { text },
            Extraction::NotFound => ExtractedContent::failed(ExtractionFailure::NotFound),
        },
    }
}

/// Serve requests for one page until every sender is dropped.
///
/// The parsed document is not `Send`, so each request re-parses the page
/// inside a synchronous call.
pub async fn serve(html: String, mut inbox: mpsc::Receiver<Envelope>) {
    debug!("Extractor listening ({} bytes of HTML)", html.len());
    while let Some(envelope) = inbox.recv().await {
        debug!("Message received: {:?}", envelope.request);
        let response = handle_message(&html, envelope.request);
        if envelope.reply.send(response).is_err() {
            debug!("Requester went away before the reply was sent");
        }
    }
    debug!("Extractor stopped");
}

/// Visible text of an element, roughly as a browser's `innerText` renders it
fn rendered_text(element: ElementRef) -> String {
    let mut buffer = TextBuffer::default();
    collect_text(element, &mut buffer);
    buffer.finish()
}

fn collect_text(element: ElementRef, buffer: &mut TextBuffer) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => buffer.push_text(text),
            Node::Element(inner) => {
                let name = inner.name();
                if SKIPPED_ELEMENTS.contains(&name) || is_hidden(inner) {
                    continue;
                }
                if name == "br" {
                    buffer.line_break();
                    continue;
                }
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                if CELL_ELEMENTS.contains(&name) {
                    buffer.cell_break();
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    buffer.line_break();
                }
                let preformatted = name == "pre";
                if preformatted {
                    buffer.preformatted += 1;
                }
                collect_text(child_element, buffer);
                if preformatted {
                    buffer.preformatted -= 1;
                }
                if block {
                    buffer.line_break();
                }
            }
            _ => {}
        }
    }
}

fn is_hidden(element: &scraper::node::Element) -> bool {
    if element.attr("hidden").is_some() || element.attr("aria-hidden") == Some("true") {
        return true;
    }
    element.attr("style").is_some_and(|style| {
        let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
        compact.to_ascii_lowercase().contains("display:none")
    })
}

/// Accumulates lines, collapsing whitespace runs the way layout does
#[derive(Default)]
struct TextBuffer {
    lines: Vec<String>,
    current: String,
    pending_space: bool,
    /// Depth of enclosing `<pre>` elements; whitespace is kept inside them
    preformatted: usize,
}

impl TextBuffer {
    fn push_text(&mut self, text: &str) {
        if self.preformatted > 0 {
            self.push_preformatted(text);
            return;
        }
        let mut words = text.split_whitespace().peekable();
        if words.peek().is_none() {
            if !text.is_empty() {
                self.pending_space = true;
            }
            return;
        }
        if text.starts_with(char::is_whitespace) {
            self.pending_space = true;
        }
        for word in words {
            if self.pending_space && !self.current.is_empty() && !self.current.ends_with('\t') {
                self.current.push(' ');
            }
            self.current.push_str(word);
            self.pending_space = true;
        }
        self.pending_space = text.ends_with(char::is_whitespace);
    }

    fn push_preformatted(&mut self, text: &str) {
        if self.pending_space && !self.current.is_empty() {
            self.current.push(' ');
        }
        self.pending_space = false;
        let mut segments = text.split('\n');
        if let Some(first) = segments.next() {
            self.current.push_str(first);
        }
        for segment in segments {
            self.lines.push(std::mem::take(&mut self.current));
            self.current.push_str(segment);
        }
    }

    /// Separate a cell from the previous one in the same row
    fn cell_break(&mut self) {
        if !self.current.is_empty() {
            self.current.push('\t');
        }
        self.pending_space = false;
    }

    fn line_break(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(std::mem::take(&mut self.current));
        }
        self.pending_space = false;
    }

    fn finish(mut self) -> String {
        self.line_break();
        self.lines.join("\n")
    }
}
