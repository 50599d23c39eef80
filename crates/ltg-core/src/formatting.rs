//! MarkdownV2 rendering of log records.

use std::fmt;

use chrono::Local;

use crate::{identity::User, level::Level, metadata::Metadata, record::SourceLocation};

/// Characters that MarkdownV2 treats as markup, plus the escape character itself.
pub const RESERVED_CHARS: [char; 19] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

pub fn is_reserved(c: char) -> bool {
    RESERVED_CHARS.contains(&c)
}

/// Prefix every reserved character with a backslash.
///
/// Not idempotent: escaping twice doubles the backslashes, so raw text must
/// be escaped exactly once.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if is_reserved(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============== Timestamp ==============

/// Local time as `%Y-%m-%dT%H:%M:%S%z`, e.g. `2024-05-01T12:30:00+0200`.
pub fn local_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

// ============== Message Body ==============

/// Everything that goes into one rendered alert.
///
/// Rendering is a pure function of these fields; the caller supplies the
/// timestamp.
#[derive(Clone, Debug)]
pub struct MarkdownLog<'a> {
    pub timestamp: &'a str,
    pub label: &'a str,
    pub level: Level,
    pub message: &'a str,
    pub metadata: &'a Metadata,
    pub location: &'a SourceLocation,
    pub mentions: &'a [User],
}

impl fmt::Display for MarkdownLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = format!("[{}] [{}]", self.label, self.level);
        write!(
            f,
            "{} *{}*\n*{}*\n{}",
            escape_markdown_v2(self.timestamp),
            escape_markdown_v2(&title),
            escape_markdown_v2(self.message),
            escape_markdown_v2(&self.location.to_string()),
        )?;

        if !self.metadata.is_empty() {
            f.write_str("\n*Metadata*")?;
            // Values are interpolated as-is.
            for (key, value) in self.metadata {
                write!(f, "\n{}: {}", escape_markdown_v2(key), value)?;
            }
        }

        if !self.mentions.is_empty() {
            f.write_str("\n")?;
            for (i, user) in self.mentions.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{user}")?;
            }
        }

        Ok(())
    }
}
