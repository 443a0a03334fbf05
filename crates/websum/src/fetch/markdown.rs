//! HTML → markdown normalization.

use htmd::HtmlToMarkdown;
use htmd::options::{CodeBlockStyle, HeadingStyle, LinkStyle, Options};

use crate::error::{Result, WebsumError};

/// Elements dropped entirely, including their text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "head", "meta", "link", "svg",
];

/// Whether a `Content-Type` header value denotes HTML that should be
/// converted rather than passed through.
pub fn is_markup(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

/// Render HTML as markdown with ATX headings and fenced code blocks.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let options = Options {
        heading_style: HeadingStyle::Atx,
        code_block_style: CodeBlockStyle::Fenced,
        link_style: LinkStyle::Inlined,
        ..Default::default()
    };
    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .options(options)
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| WebsumError::Normalize(e.to_string()))?;
    Ok(collapse_blank_lines(&markdown))
}

/// Keep at most one blank line between blocks and trim the ends.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim().to_string()
}
