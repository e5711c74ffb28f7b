//! Markdown front end
//!
//! Parses documentation sources into a [`Document`]. The documentation store
//! only depends on the [`DocumentParser`] trait, so embedders can plug in a
//! different parser as long as it emits the same fragment conventions.

mod block;
mod inline;
mod types;

pub use types::{Block, Document, Text, TextFragment};

use thiserror::Error;

/// Maximum depth of nested container blocks (blockquotes, list items), and
/// separately of nested emphasis and links within one paragraph
pub const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkdownError {
    #[error("block nesting exceeds {limit} levels")]
    TooDeeplyNested { limit: usize },
}

/// Turns Markdown source into a document tree
pub trait DocumentParser {
    fn parse(&self, source: &str) -> Result<Document, MarkdownError>;
}

/// The built-in Markdown parser
#[derive(Debug, Default, Clone, Copy)]
pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentParser for Parser {
    fn parse(&self, source: &str) -> Result<Document, MarkdownError> {
        block::parse_document(source)
    }
}
