//! Document tree produced by the Markdown parser.
//!
//! Blocks carry inline content as [`Text`], a flat sequence of
//! [`TextFragment`]s. Brackets and parentheses that do not form a link stay
//! in the sequence as [`TextFragment::Delimiter`] tokens.

use serde::{Deserialize, Serialize};

/// A parsed Markdown document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Block-level element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Text),
    Heading {
        level: u8,
        text: Text,
    },
    ThematicBreak,
    Blockquote(Vec<Block>),
    List {
        ordered: bool,
        start: u64,
        tight: bool,
        items: Vec<Vec<Block>>,
    },
    CodeBlock {
        info: Option<String>,
        code: String,
    },
    HtmlBlock(String),
    ReferenceDefinition {
        label: String,
        destination: String,
        title: Option<String>,
    },
}

impl Block {
    /// The inline content of a paragraph block
    pub fn as_paragraph(&self) -> Option<&Text> {
        match self {
            Block::Paragraph(text) => Some(text),
            _ => None,
        }
    }
}

/// Inline element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TextFragment {
    Text(String),
    Code(String),
    Emphasis(Text),
    Strong(Text),
    Link {
        text: Text,
        destination: String,
        title: Option<String>,
    },
    AutoLink(String),
    Html(String),
    Delimiter(char),
    SoftBreak,
    HardBreak,
}

/// Sequence of inline fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Text(Vec<TextFragment>);

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragments(&self) -> &[TextFragment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends a fragment, merging adjacent plain text runs
    pub fn push(&mut self, fragment: TextFragment) {
        if let TextFragment::Text(next) = &fragment {
            if next.is_empty() {
                return;
            }
            if let Some(TextFragment::Text(prev)) = self.0.last_mut() {
                prev.push_str(next);
                return;
            }
        }
        self.0.push(fragment);
    }

    /// Flattens the fragments into their readable characters
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        for fragment in &self.0 {
            match fragment {
                TextFragment::Text(s) | TextFragment::Code(s) | TextFragment::AutoLink(s) => {
                    out.push_str(s)
                }
                TextFragment::Emphasis(inner)
                | TextFragment::Strong(inner)
                | TextFragment::Link { text: inner, .. } => inner.write_plain(out),
                TextFragment::Html(_) => {}
                TextFragment::Delimiter(ch) => out.push(*ch),
                TextFragment::SoftBreak => out.push(' '),
                TextFragment::HardBreak => out.push('\n'),
            }
        }
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        let mut text = Text::new();
        text.push(TextFragment::Text(s.to_string()));
        text
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        let mut text = Text::new();
        text.push(TextFragment::Text(s));
        text
    }
}

impl From<Vec<TextFragment>> for Text {
    fn from(fragments: Vec<TextFragment>) -> Self {
        fragments.into_iter().collect()
    }
}

impl FromIterator<TextFragment> for Text {
    fn from_iter<I: IntoIterator<Item = TextFragment>>(iter: I) -> Self {
        let mut text = Text::new();
        for fragment in iter {
            text.push(fragment);
        }
        text
    }
}

impl Extend<TextFragment> for Text {
    fn extend<I: IntoIterator<Item = TextFragment>>(&mut self, iter: I) {
        for fragment in iter {
            self.push(fragment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_merges_text_runs() {
        let mut text = Text::new();
        text.push(TextFragment::Text("car".into()));
        text.push(TextFragment::Text(" and cdr".into()));
        text.push(TextFragment::Delimiter('('));

        assert_eq!(text.len(), 2);
        assert_eq!(text.fragments()[0], TextFragment::Text("car and cdr".into()));
    }

    #[test]
    fn test_push_skips_empty_text() {
        let mut text = Text::new();
        text.push(TextFragment::Text(String::new()));
        assert!(text.is_empty());
    }

    #[test]
    fn test_plain_text() {
        let text: Text = vec![
            TextFragment::Strong(Text::from(vec![
                TextFragment::Delimiter('('),
                TextFragment::Text("car pair".into()),
                TextFragment::Delimiter(')'),
            ])),
            TextFragment::Html("<span>".into()),
            TextFragment::HardBreak,
            TextFragment::Code("x".into()),
        ]
        .into();

        assert_eq!(text.plain_text(), "(car pair)\nx");
    }

    #[test]
    fn test_block_serializes_with_type_tag() {
        let block = Block::Paragraph(Text::from("hello"));
        let json = serde_json::to_value(&block).unwrap();

        assert_eq!(json["type"], "paragraph");
        assert_eq!(json["value"][0]["type"], "text");
        assert_eq!(json["value"][0]["value"], "hello");
    }
}
