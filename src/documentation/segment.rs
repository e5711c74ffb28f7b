use super::signature::{name_and_type, signature};
use crate::markdown::Block;

/// A documentation entry: one signature line and the blocks that describe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub names: Vec<String>,
    pub kind: String,
    /// Starts with the signature paragraph
    pub body: Vec<Block>,
}

/// Blocks that end the body of the entry before them
fn is_terminator(block: &Block) -> bool {
    match block {
        Block::ThematicBreak | Block::Heading { .. } | Block::ReferenceDefinition { .. } => true,
        Block::Paragraph(text) => name_and_type(text.fragments()).is_some(),
        _ => false,
    }
}

/// Splits a document's top-level blocks into documentation entries.
///
/// Blocks before the first signature line and blocks between a terminator and
/// the next signature line belong to no entry.
pub fn segment(blocks: &[Block]) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut i = 0;

    while i < blocks.len() {
        let sig = blocks[i]
            .as_paragraph()
            .and_then(|text| signature(text.fragments()));
        i += 1;
        let Some(sig) = sig else {
            continue;
        };

        let mut body = vec![Block::Paragraph(sig.text)];
        while i < blocks.len() && !is_terminator(&blocks[i]) {
            body.push(blocks[i].clone());
            i += 1;
        }
        entries.push(Entry {
            names: sig.names,
            kind: sig.kind,
            body,
        });
    }

    entries
}
