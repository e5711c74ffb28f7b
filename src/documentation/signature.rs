//! Signature line recognition
//!
//! A signature line is a paragraph that opens with a bold name followed by a
//! bracketed category inside an inline `<span>`:
//!
//! ```text
//! **car** <span style="float:right;text-align:rigth;">[procedure]</span>
//! **(list-tail list k)** <span style="float:right;text-align:rigth;">[procedure]</span>
//! ```
//!
//! Further bold spans that follow a hard line break in the same paragraph
//! document additional names sharing the entry.

use crate::markdown::{Text, TextFragment};

/// Fragments making up a signature header
const HEADER_LEN: usize = 6;

/// Marker of rest-argument placeholder signatures
const ELLIPSIS: &str = "...";

/// A recognized signature line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Documented names, first the header's, then each continuation's
    pub names: Vec<String>,
    /// Category tag such as `procedure`
    pub kind: String,
    /// The bold spans of the line, joined by hard line breaks
    pub text: Text,
}

/// Raw name and category text of a signature header, if `fragments` starts
/// with one
pub fn name_and_type(fragments: &[TextFragment]) -> Option<(&str, &str)> {
    match_bold_name_type_header(fragments)
}

/// Matches `Strong, Text, Html("<span…"), '[', Text, ']'` at the start of
/// the fragments
pub fn match_bold_name_type_header(fragments: &[TextFragment]) -> Option<(&str, &str)> {
    if fragments.len() < HEADER_LEN {
        return None;
    }
    match fragments {
        [TextFragment::Strong(name), TextFragment::Text(_), TextFragment::Html(html), TextFragment::Delimiter('['), TextFragment::Text(kind), TextFragment::Delimiter(']'), ..]
            if html.starts_with("<span") =>
        {
            Some((strong_name(name)?, kind.as_str()))
        }
        _ => None,
    }
}

/// Matches the bold span of a continuation line. Parenthesized forms whose
/// name text contains `...` are placeholders and yield no name.
pub fn match_continuation_signature(strong: &Text) -> Option<&str> {
    match strong.fragments() {
        [TextFragment::Text(name)] => Some(name),
        [TextFragment::Delimiter('('), TextFragment::Text(name), .., TextFragment::Delimiter(')')]
            if !name.contains(ELLIPSIS) =>
        {
            Some(name)
        }
        _ => None,
    }
}

/// Name text inside a header's bold span: `name` or `(name args…)`
fn strong_name(strong: &Text) -> Option<&str> {
    match strong.fragments() {
        [TextFragment::Text(name)] => Some(name),
        [TextFragment::Delimiter('('), TextFragment::Text(name), .., TextFragment::Delimiter(')')] => {
            Some(name)
        }
        _ => None,
    }
}

/// The text up to the first whitespace character after trimming
pub fn isolate_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .split(char::is_whitespace)
        .next()
        .unwrap_or(trimmed)
}

/// Recognizes a signature line and collects every name it documents
pub fn signature(fragments: &[TextFragment]) -> Option<Signature> {
    let (raw_name, raw_kind) = name_and_type(fragments)?;

    let mut names = vec![isolate_name(raw_name).to_string()];
    let mut text = Text::new();
    text.push(fragments[0].clone());

    let mut rest = &fragments[HEADER_LEN..];
    while !rest.is_empty() {
        if let [TextFragment::HardBreak, TextFragment::Strong(strong), ..] = rest {
            text.push(TextFragment::HardBreak);
            text.push(TextFragment::Strong(strong.clone()));
            if let Some(name) = match_continuation_signature(strong) {
                names.push(isolate_name(name).to_string());
            }
            rest = &rest[2..];
        } else {
            rest = &rest[1..];
        }
    }

    Some(Signature {
        names,
        kind: raw_kind.trim().to_string(),
        text,
    })
}
