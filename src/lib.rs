//! # Precis
//!
//! Summarise the readable content of a webpage with Gemini.
//!
//! ## Pipeline
//!
//! - **Extractor**: pulls the article (or paragraph) text out of a page
//! - **Bridge**: typed request/response messaging with the extractor attached to a tab
//! - **Summarizer**: builds a styled prompt and calls Gemini `generateContent`
//! - **Controller**: runs one summarize action at a time and renders the result

pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod render;
pub mod summarizer;
pub mod surface;

pub use bridge::{LocalPageHost, PageHost, TabId};
pub use config::Config;
pub use controller::{Controller, Outcome, RequestState};
pub use credentials::{Credential, CredentialStore, SledCredentialStore, StaticCredentialStore};
pub use error::{PipelineError, UserMessage};
pub use extractor::ExtractedContent;
pub use summarizer::{GeminiClient, Summarize, SummaryStyle};
