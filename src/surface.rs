//! Display surfaces the controller writes status and results into.

use colored::Colorize;
use parking_lot::Mutex;

use crate::render::markup_to_text;

/// One thing shown in the result region
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Plain status or error text
    Text(String),
    /// Rendered summary markup
    Markup(String),
}

impl Frame {
    /// What a user would select and copy from this frame
    pub fn visible_text(&self) -> String {
        match self {
            Frame::Text(text) => text.clone(),
            Frame::Markup(markup) => markup_to_text(markup),
        }
    }
}

/// The result region of the user interface
pub trait Surface: Send + Sync {
    fn show_text(&self, text: &str);
    fn show_markup(&self, markup: &str);
    /// The frame currently displayed, if any
    fn current(&self) -> Option<Frame>;

    fn visible_text(&self) -> String {
        self.current()
            .map(|frame| frame.visible_text())
            .unwrap_or_default()
    }
}

/// Writes frames to the terminal as they arrive
#[derive(Default)]
pub struct TerminalSurface {
    current: Mutex<Option<Frame>>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for TerminalSurface {
    fn show_text(&self, text: &str) {
        eprintln!("{}", text.dimmed());
        *self.current.lock() = Some(Frame::Text(text.to_string()));
    }

    fn show_markup(&self, markup: &str) {
        let frame = Frame::Markup(markup.to_string());
        println!("\n{}", frame.visible_text());
        *self.current.lock() = Some(frame);
    }

    fn current(&self) -> Option<Frame> {
        self.current.lock().clone()
    }
}

/// Keeps every frame shown, for inspection
#[derive(Default)]
pub struct RecordingSurface {
    frames: Mutex<Vec<Frame>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }
}

impl Surface for RecordingSurface {
    fn show_text(&self, text: &str) {
        self.frames.lock().push(Frame::Text(text.to_string()));
    }

    fn show_markup(&self, markup: &str) {
        self.frames.lock().push(Frame::Markup(markup.to_string()));
    }

    fn current(&self) -> Option<Frame> {
        self.frames.lock().last().cloned()
    }
}
