//! Pipeline errors and the messages shown for them.
//!
//! Each step of the summarize pipeline fails with its own variant; the text
//! the user sees is chosen by [`UserMessage::from`], a total match over the
//! variants.

use thiserror::Error;

use crate::bridge::{BridgeError, InjectionError};
use crate::credentials::CredentialError;
use crate::summarizer::ApiError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to initialize content script: {0}")]
    Injection(#[from] InjectionError),
    #[error("API key not found. Please set it with `precis set-key`.")]
    CredentialMissing,
    #[error("failed to read API key: {0}")]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Extraction(String),
    #[error("{0}")]
    Bridge(#[from] BridgeError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("a summary is already being generated")]
    Busy,
    #[error("{0}")]
    Unclassified(String),
}

/// The fixed texts shown for failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    InvalidApiKey,
    ContentScriptFailed,
    NoReadableContent,
    Unexpected,
}

impl UserMessage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidApiKey => "❌ Invalid API key. Please check your Gemini API key.",
            Self::ContentScriptFailed => "⚠️ Failed to load content script. Please refresh.",
            Self::NoReadableContent => {
                "This webpage does not contain readable article or paragraph content."
            }
            Self::Unexpected => "⚠️ Unexpected error. Please try again later.",
        }
    }
}

impl From<&PipelineError> for UserMessage {
    fn from(error: &PipelineError) -> Self {
        match error {
            PipelineError::CredentialMissing
            | PipelineError::Credential(_)
            | PipelineError::Api(ApiError::InvalidKey(_)) => Self::InvalidApiKey,
            PipelineError::Injection(_) | PipelineError::Bridge(BridgeError::NoListener(_)) => {
                Self::ContentScriptFailed
            }
            PipelineError::Extraction(_) => Self::NoReadableContent,
            PipelineError::Api(_)
            | PipelineError::Bridge(_)
            | PipelineError::Busy
            | PipelineError::Unclassified(_) => Self::Unexpected,
        }
    }
}
