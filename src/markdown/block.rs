//! Block structure parser
//!
//! Works line by line. Container blocks (blockquotes, list items) strip their
//! markers and recurse on the remaining lines. Leaf text is kept raw until the
//! whole document is read, so reference links can see every definition.

use lazy_static::lazy_static;
use regex::Regex;

use super::inline::{normalize_label, parse_inline, References};
use super::types::{Block, Document};
use super::{MarkdownError, MAX_NESTING_DEPTH};

lazy_static! {
    static ref THEMATIC_BREAK: Regex =
        Regex::new(r"^(?:(?:\*[ \t]*){3,}|(?:-[ \t]*){3,}|(?:_[ \t]*){3,})$").unwrap();
    static ref SETEXT_UNDERLINE: Regex = Regex::new(r"^(?:=+|-+)[ \t]*$").unwrap();
    static ref ORDERED_MARKER: Regex = Regex::new(r"^([0-9]{1,9})([.)])").unwrap();
    static ref REFERENCE_DEFINITION: Regex = Regex::new(
        r#"^\[((?:[^\]\\]|\\.)+)\]:[ \t]*(<[^>]*>|\S+)(?:[ \t]+("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|\((?:[^)\\]|\\.)*\)))?[ \t]*$"#
    )
    .unwrap();
    static ref HTML_BLOCK_START: Regex = Regex::new(
        r"(?i)^(?:<!--|<\?|<![A-Za-z]|</?(?:address|article|aside|blockquote|body|center|details|dialog|dd|div|dl|dt|fieldset|figcaption|figure|footer|form|h[1-6]|head|header|hr|html|iframe|legend|li|link|main|menu|nav|ol|p|pre|section|script|style|summary|table|tbody|td|tfoot|th|thead|title|tr|ul)(?:[ \t>/]|$))"
    )
    .unwrap();
}

/// Block tree before inline parsing
enum RawBlock {
    Paragraph(String),
    Heading(u8, String),
    ThematicBreak,
    Blockquote(Vec<RawBlock>),
    List {
        ordered: bool,
        start: u64,
        tight: bool,
        items: Vec<Vec<RawBlock>>,
    },
    Code {
        info: Option<String>,
        code: String,
    },
    Html(String),
    Reference {
        label: String,
        destination: String,
        title: Option<String>,
    },
}

impl RawBlock {
    fn resolve(self, refs: &References) -> Result<Block, MarkdownError> {
        let block = match self {
            RawBlock::Paragraph(text) => Block::Paragraph(parse_inline(&text, refs)?),
            RawBlock::Heading(level, text) => Block::Heading {
                level,
                text: parse_inline(&text, refs)?,
            },
            RawBlock::ThematicBreak => Block::ThematicBreak,
            RawBlock::Blockquote(blocks) => Block::Blockquote(resolve_all(blocks, refs)?),
            RawBlock::List {
                ordered,
                start,
                tight,
                items,
            } => Block::List {
                ordered,
                start,
                tight,
                items: items
                    .into_iter()
                    .map(|item| resolve_all(item, refs))
                    .collect::<Result<_, _>>()?,
            },
            RawBlock::Code { info, code } => Block::CodeBlock { info, code },
            RawBlock::Html(html) => Block::HtmlBlock(html),
            RawBlock::Reference {
                label,
                destination,
                title,
            } => Block::ReferenceDefinition {
                label,
                destination,
                title,
            },
        };
        Ok(block)
    }
}

fn resolve_all(blocks: Vec<RawBlock>, refs: &References) -> Result<Vec<Block>, MarkdownError> {
    blocks.into_iter().map(|block| block.resolve(refs)).collect()
}

pub(crate) fn parse_document(source: &str) -> Result<Document, MarkdownError> {
    let source = source.replace('\0', "\u{FFFD}");
    let lines: Vec<String> = source.lines().map(expand_tabs).collect();
    let raw = parse_blocks(&lines, 0)?;

    let mut refs = References::new();
    collect_references(&raw, &mut refs);

    Ok(Document::new(resolve_all(raw, &refs)?))
}

fn collect_references(blocks: &[RawBlock], refs: &mut References) {
    for block in blocks {
        match block {
            RawBlock::Reference {
                label,
                destination,
                title,
            } => {
                // The first definition of a label wins.
                refs.entry(normalize_label(label))
                    .or_insert_with(|| (destination.clone(), title.clone()));
            }
            RawBlock::Blockquote(inner) => collect_references(inner, refs),
            RawBlock::List { items, .. } => {
                for item in items {
                    collect_references(item, refs);
                }
            }
            _ => {}
        }
    }
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let width = 4 - column % 4;
            out.extend(std::iter::repeat(' ').take(width));
            column += width;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn parse_blocks(lines: &[String], depth: usize) -> Result<Vec<RawBlock>, MarkdownError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(MarkdownError::TooDeeplyNested {
            limit: MAX_NESTING_DEPTH,
        });
    }

    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_str();
        if is_blank(line) {
            i += 1;
            continue;
        }

        let indent = indentation(line);
        if indent >= 4 {
            i = indented_code(lines, i, &mut blocks);
            continue;
        }

        let rest = &line[indent..];
        if let Some(fence) = Fence::open(rest, indent) {
            i = fence.collect(lines, i, &mut blocks);
        } else if let Some(heading) = atx_heading(rest) {
            blocks.push(heading);
            i += 1;
        } else if THEMATIC_BREAK.is_match(rest) {
            blocks.push(RawBlock::ThematicBreak);
            i += 1;
        } else if rest.starts_with('>') {
            i = blockquote(lines, i, depth, &mut blocks)?;
        } else if let Some(marker) = ListMarker::parse(rest, indent) {
            i = list(lines, i, marker, depth, &mut blocks)?;
        } else if HTML_BLOCK_START.is_match(rest) {
            i = html_block(lines, i, &mut blocks);
        } else {
            i = paragraph(lines, i, &mut blocks);
        }
    }

    Ok(blocks)
}

/// True if the line opens a block that interrupts a paragraph
fn starts_block(line: &str) -> bool {
    let indent = indentation(line);
    if indent >= 4 {
        return false;
    }
    let rest = &line[indent..];
    Fence::open(rest, indent).is_some()
        || atx_heading(rest).is_some()
        || THEMATIC_BREAK.is_match(rest)
        || rest.starts_with('>')
        || HTML_BLOCK_START.is_match(rest)
        || ListMarker::parse(rest, indent)
            .map_or(false, |m| !m.empty && (!m.ordered || m.start == 1))
}

fn atx_heading(rest: &str) -> Option<RawBlock> {
    let hashes = rest.len() - rest.trim_start_matches('#').len();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let after = &rest[hashes..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }

    let mut content = after.trim();
    let without_closing = content.trim_end_matches('#');
    if without_closing.is_empty() {
        content = "";
    } else if without_closing.ends_with([' ', '\t']) {
        content = without_closing.trim_end();
    }

    Some(RawBlock::Heading(hashes as u8, content.to_string()))
}

struct Fence {
    ch: char,
    len: usize,
    indent: usize,
    info: Option<String>,
}

impl Fence {
    fn open(rest: &str, indent: usize) -> Option<Fence> {
        let ch = rest.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = rest.len() - rest.trim_start_matches(ch).len();
        if len < 3 {
            return None;
        }
        let info = rest[len..].trim();
        if ch == '`' && info.contains('`') {
            return None;
        }
        Some(Fence {
            ch,
            len,
            indent,
            info: (!info.is_empty()).then(|| info.to_string()),
        })
    }

    fn closes(&self, line: &str) -> bool {
        let indent = indentation(line);
        if indent >= 4 {
            return false;
        }
        let rest = &line[indent..];
        let run = rest.len() - rest.trim_start_matches(self.ch).len();
        run >= self.len && rest[run..].trim().is_empty()
    }

    fn collect(self, lines: &[String], start: usize, blocks: &mut Vec<RawBlock>) -> usize {
        let mut code = String::new();
        let mut i = start + 1;
        while i < lines.len() {
            let line = &lines[i];
            i += 1;
            if self.closes(line) {
                break;
            }
            let strip = indentation(line).min(self.indent);
            code.push_str(&line[strip..]);
            code.push('\n');
        }
        blocks.push(RawBlock::Code {
            info: self.info,
            code,
        });
        i
    }
}

fn indented_code(lines: &[String], start: usize, blocks: &mut Vec<RawBlock>) -> usize {
    let mut code_lines: Vec<&str> = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let line = lines[i].as_str();
        if is_blank(line) {
            code_lines.push(line.get(4..).unwrap_or(""));
        } else if indentation(line) >= 4 {
            code_lines.push(&line[4..]);
        } else {
            break;
        }
        i += 1;
    }
    while code_lines.last().map_or(false, |l| is_blank(l)) {
        code_lines.pop();
    }

    let mut code = code_lines.join("\n");
    code.push('\n');
    blocks.push(RawBlock::Code { info: None, code });
    i
}

fn blockquote(
    lines: &[String],
    start: usize,
    depth: usize,
    blocks: &mut Vec<RawBlock>,
) -> Result<usize, MarkdownError> {
    let mut inner: Vec<String> = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let line = lines[i].as_str();
        let indent = indentation(line);
        if indent < 4 && line[indent..].starts_with('>') {
            let after = &line[indent + 1..];
            inner.push(after.strip_prefix(' ').unwrap_or(after).to_string());
        } else if !is_blank(line)
            && inner.last().map_or(false, |l| !is_blank(l))
            && !starts_block(line)
        {
            // Lazy paragraph continuation
            inner.push(line.to_string());
        } else {
            break;
        }
        i += 1;
    }

    blocks.push(RawBlock::Blockquote(parse_blocks(&inner, depth + 1)?));
    Ok(i)
}

#[derive(Clone)]
struct ListMarker {
    ordered: bool,
    /// Bullet character, or the `.`/`)` after an ordinal
    ch: char,
    start: u64,
    /// Column where the item content begins
    content_offset: usize,
    empty: bool,
}

impl ListMarker {
    fn parse(rest: &str, indent: usize) -> Option<ListMarker> {
        let (ordered, ch, start, marker_len) = match rest.chars().next() {
            Some(c @ ('-' | '+' | '*')) => (false, c, 1, 1),
            _ => {
                let caps = ORDERED_MARKER.captures(rest)?;
                let start = caps[1].parse().ok()?;
                let delimiter = caps[2].chars().next()?;
                (true, delimiter, start, caps[0].len())
            }
        };

        let after = &rest[marker_len..];
        if !after.is_empty() && !after.starts_with(' ') {
            return None;
        }
        let spaces = after.len() - after.trim_start_matches(' ').len();
        let empty = after.trim().is_empty();
        let padding = if empty || spaces > 4 { 1 } else { spaces };

        Some(ListMarker {
            ordered,
            ch,
            start,
            content_offset: indent + marker_len + padding,
            empty,
        })
    }

    fn continues(&self, other: &ListMarker) -> bool {
        self.ordered == other.ordered && self.ch == other.ch
    }
}

fn list(
    lines: &[String],
    start: usize,
    first: ListMarker,
    depth: usize,
    blocks: &mut Vec<RawBlock>,
) -> Result<usize, MarkdownError> {
    let mut raw_items: Vec<Vec<String>> = Vec::new();
    let mut loose = false;
    let mut marker = first.clone();
    let mut i = start;

    loop {
        let offset = marker.content_offset;
        let mut item = vec![lines[i].get(offset..).unwrap_or("").to_string()];
        i += 1;

        while i < lines.len() {
            let line = lines[i].as_str();
            if is_blank(line) {
                item.push(String::new());
            } else if indentation(line) >= offset {
                item.push(line[offset..].to_string());
            } else if item.last().map_or(false, |l| !is_blank(l)) && !starts_block(line) {
                item.push(line.trim_start().to_string());
            } else {
                break;
            }
            i += 1;
        }

        let trailing = item.iter().rev().take_while(|l| is_blank(l)).count();
        item.truncate(item.len() - trailing);
        raw_items.push(item);

        let next = lines.get(i).and_then(|line| {
            let indent = indentation(line);
            let rest = line.get(indent..)?;
            if indent >= 4 || THEMATIC_BREAK.is_match(rest) {
                return None;
            }
            ListMarker::parse(rest, indent).filter(|m| m.continues(&first))
        });
        match next {
            Some(next) => {
                if trailing > 0 {
                    loose = true;
                }
                marker = next;
            }
            None => break,
        }
    }

    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let has_gap = raw.iter().any(|l| is_blank(l));
        let parsed = parse_blocks(&raw, depth + 1)?;
        if has_gap && parsed.len() > 1 {
            loose = true;
        }
        items.push(parsed);
    }

    blocks.push(RawBlock::List {
        ordered: first.ordered,
        start: first.start,
        tight: !loose,
        items,
    });
    Ok(i)
}

fn html_block(lines: &[String], start: usize, blocks: &mut Vec<RawBlock>) -> usize {
    let mut i = start;
    while i < lines.len() && !is_blank(&lines[i]) {
        i += 1;
    }
    blocks.push(RawBlock::Html(lines[start..i].join("\n")));
    i
}

fn paragraph(lines: &[String], start: usize, blocks: &mut Vec<RawBlock>) -> usize {
    let mut text_lines: Vec<&str> = vec![lines[start].trim_start()];
    let mut i = start + 1;

    while i < lines.len() {
        let line = lines[i].as_str();
        if is_blank(line) {
            break;
        }
        let indent = indentation(line);
        if indent < 4 {
            let rest = &line[indent..];
            if SETEXT_UNDERLINE.is_match(rest) {
                let level = if rest.starts_with('=') { 1 } else { 2 };
                if push_paragraph(&text_lines, Some(level), blocks) {
                    return i + 1;
                }
                return i;
            }
            if starts_block(line) {
                break;
            }
        }
        text_lines.push(line.trim_start());
        i += 1;
    }

    push_paragraph(&text_lines, None, blocks);
    i
}

/// Splits leading reference definitions off a paragraph and pushes the rest.
/// Returns false if nothing but definitions was left.
fn push_paragraph(lines: &[&str], heading: Option<u8>, blocks: &mut Vec<RawBlock>) -> bool {
    let mut consumed = 0;
    for line in lines {
        let Some(caps) = REFERENCE_DEFINITION.captures(line) else {
            break;
        };
        let destination = caps[2].trim_start_matches('<').trim_end_matches('>');
        let title = caps.get(3).map(|t| {
            let t = t.as_str();
            t[1..t.len() - 1].to_string()
        });
        blocks.push(RawBlock::Reference {
            label: caps[1].to_string(),
            destination: destination.to_string(),
            title,
        });
        consumed += 1;
    }

    let remaining = &lines[consumed..];
    if remaining.is_empty() {
        return false;
    }

    let text = remaining.join("\n").trim_end().to_string();
    blocks.push(match heading {
        Some(level) => RawBlock::Heading(level, text),
        None => RawBlock::Paragraph(text),
    });
    true
}
