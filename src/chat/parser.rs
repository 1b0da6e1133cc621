//! Statement extraction from assistant messages.
//!
//! Finds fenced code blocks tagged `sql` (any letter case) and returns the
//! statements they contain, plus the prose around them so a renderer can
//! interleave text and statement blocks.
//!
//! The tag may be followed by a newline or, for one-line blocks such as
//! "```sql SELECT 1```", by spaces.

use regex::Regex;
use std::sync::OnceLock;

/// A statement found inside a fenced SQL block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStatement {
    /// Block body with surrounding whitespace trimmed.
    pub raw_statement: String,
    /// Byte offset of the opening fence.
    pub span_start: usize,
    /// Byte offset just past the closing fence.
    pub span_end: usize,
}

/// A piece of a message, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Sql(String),
}

fn sql_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*(?i:sql)(?:[ \t]*\r?\n|[ \t]+)(.*?)```")
            .expect("fenced SQL pattern is valid")
    })
}

/// Extracts every fenced SQL statement from `text`, in document order.
///
/// Returns an empty list when there is no block; that is not an error.
/// Blocks with an empty body are skipped, and an unterminated fence is left as
/// prose.
pub fn extract_statements(text: &str) -> Vec<ExtractedStatement> {
    sql_fence()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let body = caps.get(1)?.as_str().trim();
            if body.is_empty() {
                return None;
            }
            Some(ExtractedStatement {
                raw_statement: body.to_string(),
                span_start: whole.start(),
                span_end: whole.end(),
            })
        })
        .collect()
}

/// Returns the first extracted statement, if any.
pub fn first_statement(text: &str) -> Option<ExtractedStatement> {
    extract_statements(text).into_iter().next()
}

/// Splits `text` into prose and SQL segments.
///
/// Whitespace-only prose between blocks is dropped; other prose is kept
/// trimmed.
pub fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for statement in extract_statements(text) {
        push_text(&mut segments, &text[cursor..statement.span_start]);
        segments.push(Segment::Sql(statement.raw_statement));
        cursor = statement.span_end;
    }
    push_text(&mut segments, &text[cursor..]);

    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}
