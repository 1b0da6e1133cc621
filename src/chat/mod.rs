//! Chat transcript handling.
//!
//! The transcript itself belongs to the conversation layer. This module reads
//! it: statement extraction from assistant messages, and the filtered view the
//! operator sees while a statement awaits approval.

mod parser;
mod transcript;
mod visibility;

pub use parser::{extract_statements, first_statement, split_segments, ExtractedStatement, Segment};
pub use transcript::{MessageId, Sender, TranscriptMessage};
pub use visibility::VisibilityCoordinator;
