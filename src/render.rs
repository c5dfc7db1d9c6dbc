//! Summary text to display markup.

/// Glyph replacing a leading `"- "` on each line
pub const BULLET: &str = "• ";

/// Separator inserted for every newline
pub const PARAGRAPH_BREAK: &str = "<br><br>";

/// Render model output for the result surface.
///
/// Lines starting with `"- "` get a bullet glyph and every newline becomes a
/// paragraph break. Markup characters in the model output are escaped.
pub fn format_summary(summary: &str) -> String {
    summary
        .split('\n')
        .map(|line| match line.strip_prefix("- ") {
            Some(rest) => format!("{}{}", BULLET, escape_html(rest)),
            None => escape_html(line),
        })
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

/// Visible text of rendered summary markup
pub fn markup_to_text(markup: &str) -> String {
    markup
        .replace(PARAGRAPH_BREAK, "\n")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
