//! Orchestration of the summarize action.
//!
//! One click runs injection, credential read, extraction, summarization and
//! rendering in sequence. At most one run is in flight; a click arriving while
//! another run is active is rejected without touching the surface.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bridge::PageHost;
use crate::credentials::CredentialStore;
use crate::error::{PipelineError, UserMessage};
use crate::extractor::{ExtractedContent, ExtractionFailure};
use crate::render::format_summary;
use crate::summarizer::{Summarize, SummaryStyle};
use crate::surface::Surface;

pub const STATUS_INITIALIZING: &str = "Initializing...";
pub const STATUS_EXTRACTING: &str = "Extracting content...";
pub const STATUS_GENERATING: &str = "Generating summary...";
pub const STATUS_NO_CONTENT: &str = "No content found on this page";

/// Where the current run is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Injecting,
    ReadingCredential,
    ExtractingContent,
    GeneratingSummary,
    Done,
    Failed,
}

impl RequestState {
    pub fn in_flight(&self) -> bool {
        !matches!(self, Self::Idle | Self::Done | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a finished run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The rendered summary markup
    Summarized(String),
    /// The page had neither an article nor paragraphs
    NoContent,
}

/// Drives the pipeline and owns the request state
pub struct Controller {
    host: Arc<dyn PageHost>,
    credentials: Arc<dyn CredentialStore>,
    summarizer: Arc<dyn Summarize>,
    surface: Arc<dyn Surface>,
    state: Mutex<RequestState>,
}

/// Marks the run failed if it is dropped before finishing
struct Flight<'a> {
    state: &'a Mutex<RequestState>,
}

impl Flight<'_> {
    fn advance(&self, next: RequestState) {
        let mut state = self.state.lock();
        debug!("Request state {} -> {}", *state, next);
        *state = next;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.in_flight() {
            debug!("Request abandoned in state {}", *state);
            *state = RequestState::Failed;
        }
    }
}

impl Controller {
    pub fn new(
        host: Arc<dyn PageHost>,
        credentials: Arc<dyn CredentialStore>,
        summarizer: Arc<dyn Summarize>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        Self {
            host,
            credentials,
            summarizer,
            surface,
            state: Mutex::new(RequestState::Idle),
        }
    }

    pub fn state(&self) -> RequestState {
        *self.state.lock()
    }

    /// Handle one click of the summarize button.
    ///
    /// `style` is the selected style; `None` means concise. Failures are
    /// rendered on the surface and also returned.
    pub async fn on_summarize_clicked(
        &self,
        style: Option<SummaryStyle>,
    ) -> Result<Outcome, PipelineError> {
        let flight = self.begin()?;
        let style = style.unwrap_or(SummaryStyle::Concise);

        match self.run(&flight, style).await {
            Ok(outcome) => {
                flight.advance(RequestState::Done);
                Ok(outcome)
            }
            Err(error) => {
                warn!("Summarize failed: {}", error);
                flight.advance(RequestState::Failed);
                self.surface.show_text(UserMessage::from(&error).as_str());
                Err(error)
            }
        }
    }

    fn begin(&self) -> Result<Flight<'_>, PipelineError> {
        let mut state = self.state.lock();
        if state.in_flight() {
            debug!("Rejecting click while {}", *state);
            return Err(PipelineError::Busy);
        }
        debug!("Request state {} -> {}", *state, RequestState::Injecting);
        *state = RequestState::Injecting;
        Ok(Flight { state: &self.state })
    }

    async fn run(&self, flight: &Flight<'_>, style: SummaryStyle) -> Result<Outcome, PipelineError> {
        self.surface.show_text(STATUS_INITIALIZING);
        let tab = self.host.active_tab().await?;
        self.host.inject_extractor(tab).await?;

        flight.advance(RequestState::ReadingCredential);
        let credential = self
            .credentials
            .api_key()
            .await?
            .ok_or(PipelineError::CredentialMissing)?;

        flight.advance(RequestState::ExtractingContent);
        self.surface.show_text(STATUS_EXTRACTING);
        let text = match self.host.request_content(tab).await? {
            ExtractedContent::Text { text } => text,
            ExtractedContent::Failed {
                code: ExtractionFailure::NotFound,
                ..
            } => {
                self.surface.show_text(STATUS_NO_CONTENT);
                return Ok(Outcome::NoContent);
            }
            ExtractedContent::Failed { error, .. } => {
                return Err(PipelineError::Extraction(error));
            }
        };

        flight.advance(RequestState::GeneratingSummary);
        self.surface.show_text(STATUS_GENERATING);
        let summary = self.summarizer.summarize(&text, &credential, style).await?;

        let markup = format_summary(&summary);
        self.surface.show_markup(&markup);
        Ok(Outcome::Summarized(markup))
    }
}
