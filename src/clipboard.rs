//! Copying the displayed result to the system clipboard.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const COPY_LABEL: &str = "Copy";
pub const COPIED_LABEL: &str = "✓";
pub const FAILED_LABEL: &str = "Failed!";

/// How long the feedback label stays before reverting
pub const FEEDBACK_DELAY: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("failed to access clipboard: {0}")]
    Unavailable(String),
    #[error("failed to set clipboard text: {0}")]
    Write(String),
}

pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The platform clipboard via arboard
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// Nothing was displayed, so nothing was copied
    Skipped,
    Copied,
    Failed,
}

/// A copy button whose label gives transient feedback
pub struct CopyButton {
    label: Arc<Mutex<&'static str>>,
    revert_after: Duration,
}

impl Default for CopyButton {
    fn default() -> Self {
        Self::new(FEEDBACK_DELAY)
    }
}

impl CopyButton {
    pub fn new(revert_after: Duration) -> Self {
        Self {
            label: Arc::new(Mutex::new(COPY_LABEL)),
            revert_after,
        }
    }

    pub fn label(&self) -> &'static str {
        *self.label.lock()
    }

    /// Copy `text` and show feedback, reverting the label after the delay.
    ///
    /// Must be called inside a Tokio runtime; the revert runs as a spawned task.
    pub fn click(&self, text: &str, clipboard: &dyn Clipboard) -> CopyOutcome {
        if text.is_empty() {
            return CopyOutcome::Skipped;
        }

        *self.label.lock() = COPIED_LABEL;
        let outcome = match clipboard.set_text(text) {
            Ok(()) => {
                debug!("Copied {} characters to clipboard", text.chars().count());
                CopyOutcome::Copied
            }
            Err(e) => {
                warn!("Copy failed: {}", e);
                *self.label.lock() = FAILED_LABEL;
                CopyOutcome::Failed
            }
        };

        let label = Arc::clone(&self.label);
        let delay = self.revert_after;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            *label.lock() = COPY_LABEL;
        });

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryClipboard {
        contents: Mutex<Option<String>>,
    }

    impl Clipboard for MemoryClipboard {
        fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
            *self.contents.lock() = Some(text.to_string());
            Ok(())
        }
    }

    struct BrokenClipboard;

    impl Clipboard for BrokenClipboard {
        fn set_text(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable("no display".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn copy_shows_checkmark_then_reverts() {
        let button = CopyButton::default();
        let clipboard = MemoryClipboard::default();

        assert_eq!(button.click("Summary", &clipboard), CopyOutcome::Copied);
        assert_eq!(button.label(), COPIED_LABEL);
        assert_eq!(clipboard.contents.lock().as_deref(), Some("Summary"));

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert_eq!(button.label(), COPIED_LABEL);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(button.label(), COPY_LABEL);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_copy_shows_failure_then_reverts() {
        let button = CopyButton::default();

        assert_eq!(button.click("Summary", &BrokenClipboard), CopyOutcome::Failed);
        assert_eq!(button.label(), FAILED_LABEL);

        tokio::time::sleep(FEEDBACK_DELAY + Duration::from_millis(10)).await;
        assert_eq!(button.label(), COPY_LABEL);
    }

    #[tokio::test]
    async fn empty_text_is_not_copied() {
        let button = CopyButton::default();
        let clipboard = MemoryClipboard::default();

        assert_eq!(button.click("", &clipboard), CopyOutcome::Skipped);
        assert_eq!(button.label(), COPY_LABEL);
        assert!(clipboard.contents.lock().is_none());
    }
}
