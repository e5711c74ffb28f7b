//! Documentation index for Scheme libraries
//!
//! Library documentation is written in Markdown. Symbols are introduced by
//! signature lines (a bold name followed by a right-aligned `[kind]` tag) and
//! documented by the blocks following them. The crate loads such files in the
//! background and answers library lookups, per-symbol lookups aggregated over
//! all libraries, existence checks and prefix completion.

pub mod config;
pub mod documentation;
pub mod error;
pub mod manager;
pub mod markdown;
pub mod symbol_index;

pub use config::{
    load_documentation_config, parse_documentation_config, DocumentationConfig,
    DEFAULT_CONFIG_FILE,
};
pub use documentation::{
    DocumentationStore, Entry, LibraryDocumentation, LibraryPath, LoadReport, Signature, SymbolDoc,
};
pub use error::DocumentationError;
pub use manager::{Documentation, DocumentationManager, LoadState};
pub use markdown::{Block, Document, DocumentParser, MarkdownError, Parser, Text, TextFragment};
pub use symbol_index::{CompletionIndex, CompletionQuery, SymbolIndex};
