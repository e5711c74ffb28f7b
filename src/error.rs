use std::path::PathBuf;
use thiserror::Error;

use crate::markdown::MarkdownError;

#[derive(Debug, Error)]
pub enum DocumentationError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: MarkdownError,
    },
    #[error("invalid documentation config: {0}")]
    Config(#[from] serde_json::Error),
}
