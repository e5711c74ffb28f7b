//! Inline parser
//!
//! Turns the raw text of a paragraph or heading into a [`Text`]. Emphasis is
//! resolved with the delimiter-run rules (flanking, rule of three); links are
//! resolved when a closing bracket is met. Brackets and parentheses that end
//! up outside a link are kept as [`TextFragment::Delimiter`] tokens.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::types::{Text, TextFragment};
use super::{MarkdownError, MAX_NESTING_DEPTH};

lazy_static! {
    static ref AUTOLINK: Regex = Regex::new(r"^<([A-Za-z][A-Za-z0-9+.\-]{1,31}:[^\s<>]*)>").unwrap();
    static ref EMAIL_AUTOLINK: Regex = Regex::new(
        r"^<([A-Za-z0-9.!#$%&'*+/=?^_`{|}~\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]{0,61}[A-Za-z0-9])?)*)>"
    )
    .unwrap();
    static ref HTML_TAG: Regex = Regex::new(
        r#"^(?:<[A-Za-z][A-Za-z0-9\-]*(?:\s+[A-Za-z_:][A-Za-z0-9_.:\-]*(?:\s*=\s*(?:[^\s"'=<>`]+|'[^']*'|"[^"]*"))?)*\s*/?>|</[A-Za-z][A-Za-z0-9\-]*\s*>|<!--(?s:.*?)-->)"#
    )
    .unwrap();
    static ref ENTITY: Regex =
        Regex::new(r"^&(?:#[xX]([0-9a-fA-F]{1,6})|#([0-9]{1,7})|([A-Za-z][A-Za-z0-9]{1,31}));").unwrap();
}

/// A link reference definition: destination and optional title
pub(crate) type LinkReference = (String, Option<String>);

/// Reference definitions keyed by normalized label
pub(crate) type References = HashMap<String, LinkReference>;

/// Case-folds a link label and collapses internal whitespace
pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

enum Node {
    Fragment(TextFragment),
    /// Emphasis, strong emphasis or link, with its nesting depth
    Nested(TextFragment, usize),
    Run {
        ch: char,
        count: usize,
        can_open: bool,
        can_close: bool,
    },
    Bracket {
        /// Byte offset just past the `[` in the source
        start: usize,
        active: bool,
    },
}

/// Parses inline content. Fails if emphasis and links nest deeper than
/// [`MAX_NESTING_DEPTH`].
pub(crate) fn parse_inline(source: &str, refs: &References) -> Result<Text, MarkdownError> {
    InlineParser {
        src: source,
        pos: 0,
        nodes: Vec::new(),
        refs,
    }
    .run()
}

struct InlineParser<'a> {
    src: &'a str,
    pos: usize,
    nodes: Vec<Node>,
    refs: &'a References,
}

impl<'a> InlineParser<'a> {
    fn run(mut self) -> Result<Text, MarkdownError> {
        while let Some(ch) = self.peek() {
            match ch {
                '\\' => self.backslash(),
                '`' => self.code_span(),
                '<' => self.angle(),
                '&' => self.entity(),
                '*' | '_' => self.delimiter_run(ch),
                '[' => {
                    self.pos += 1;
                    self.nodes.push(Node::Bracket {
                        start: self.pos,
                        active: true,
                    });
                }
                ']' => self.close_bracket()?,
                '(' | ')' => {
                    self.pos += 1;
                    self.push_fragment(TextFragment::Delimiter(ch));
                }
                '\n' => self.line_ending(false),
                _ => self.plain_text(),
            }
        }

        process_emphasis(&mut self.nodes)?;
        Ok(finish(self.nodes))
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn push_text(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        if let Some(Node::Fragment(TextFragment::Text(prev))) = self.nodes.last_mut() {
            prev.push_str(s);
        } else {
            self.nodes.push(Node::Fragment(TextFragment::Text(s.to_string())));
        }
    }

    fn push_fragment(&mut self, fragment: TextFragment) {
        match fragment {
            TextFragment::Text(s) => self.push_text(&s),
            other => self.nodes.push(Node::Fragment(other)),
        }
    }

    fn plain_text(&mut self) {
        let rest = self.rest();
        let end = rest
            .find(['\\', '`', '<', '&', '*', '_', '[', ']', '(', ')', '\n'])
            .unwrap_or(rest.len());
        self.push_text(&rest[..end]);
        self.pos += end;
    }

    fn backslash(&mut self) {
        self.pos += 1;
        match self.peek() {
            Some('\n') => self.line_ending(true),
            Some(c) if c.is_ascii_punctuation() => {
                self.pos += 1;
                let mut buf = [0u8; 4];
                self.push_text(c.encode_utf8(&mut buf));
            }
            _ => self.push_text("\\"),
        }
    }

    fn line_ending(&mut self, escaped: bool) {
        self.pos += 1;
        let mut hard = escaped;
        if let Some(Node::Fragment(TextFragment::Text(prev))) = self.nodes.last_mut() {
            let trimmed = prev.trim_end_matches(' ').len();
            if prev.len() - trimmed >= 2 {
                hard = true;
            }
            prev.truncate(trimmed);
            if prev.is_empty() {
                self.nodes.pop();
            }
        }
        self.nodes.push(Node::Fragment(if hard {
            TextFragment::HardBreak
        } else {
            TextFragment::SoftBreak
        }));
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches([' ', '\t']).len();
    }

    fn code_span(&mut self) {
        let rest = self.rest();
        let ticks = rest.len() - rest.trim_start_matches('`').len();
        let body = &rest[ticks..];

        let mut search = 0;
        while let Some(found) = body[search..].find('`') {
            let close_start = search + found;
            let run = body[close_start..].len() - body[close_start..].trim_start_matches('`').len();
            if run == ticks {
                let mut code = body[..close_start].replace('\n', " ");
                if code.len() >= 2
                    && code.starts_with(' ')
                    && code.ends_with(' ')
                    && !code.chars().all(|c| c == ' ')
                {
                    code = code[1..code.len() - 1].to_string();
                }
                self.pos += ticks + close_start + run;
                self.push_fragment(TextFragment::Code(code));
                return;
            }
            search = close_start + run;
        }

        self.pos += ticks;
        self.push_text(&rest[..ticks]);
    }

    fn angle(&mut self) {
        let rest = self.rest();
        if let Some(caps) = AUTOLINK.captures(rest).or_else(|| EMAIL_AUTOLINK.captures(rest)) {
            self.pos += caps[0].len();
            self.push_fragment(TextFragment::AutoLink(caps[1].to_string()));
        } else if let Some(m) = HTML_TAG.find(rest) {
            self.pos += m.end();
            self.push_fragment(TextFragment::Html(m.as_str().to_string()));
        } else {
            self.pos += 1;
            self.push_text("<");
        }
    }

    fn entity(&mut self) {
        let rest = self.rest();
        let decoded = ENTITY.captures(rest).and_then(|caps| {
            let ch = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                caps.get(3).and_then(|name| named_entity(name.as_str()))
            };
            ch.map(|c| (c, caps[0].len()))
        });

        match decoded {
            Some((ch, len)) => {
                self.pos += len;
                let ch = if ch == '\0' { '\u{FFFD}' } else { ch };
                let mut buf = [0u8; 4];
                self.push_text(ch.encode_utf8(&mut buf));
            }
            None => {
                self.pos += 1;
                self.push_text("&");
            }
        }
    }

    fn delimiter_run(&mut self, ch: char) {
        let before = self.src[..self.pos].chars().next_back();
        let rest = self.rest();
        let count = rest.len() - rest.trim_start_matches(ch).len();
        self.pos += count;
        let after = self.peek();

        let prev_space = before.map_or(true, char::is_whitespace);
        let next_space = after.map_or(true, char::is_whitespace);
        let prev_punct = before.map_or(false, is_punctuation);
        let next_punct = after.map_or(false, is_punctuation);

        let left = !next_space && (!next_punct || prev_space || prev_punct);
        let right = !prev_space && (!prev_punct || next_space || next_punct);

        let (can_open, can_close) = if ch == '*' {
            (left, right)
        } else {
            (left && (!right || prev_punct), right && (!left || next_punct))
        };

        self.nodes.push(Node::Run {
            ch,
            count,
            can_open,
            can_close,
        });
    }

    fn close_bracket(&mut self) -> Result<(), MarkdownError> {
        let close_at = self.pos;
        self.pos += 1;

        let opener = self
            .nodes
            .iter()
            .rposition(|node| matches!(node, Node::Bracket { .. }));
        let Some(opener) = opener else {
            self.push_fragment(TextFragment::Delimiter(']'));
            return Ok(());
        };
        let (label_start, active) = match self.nodes[opener] {
            Node::Bracket { start, active } => (start, active),
            _ => unreachable!("rposition matched a bracket"),
        };

        let link = if active {
            self.link_target(&self.src[label_start..close_at])
        } else {
            None
        };

        let Some((destination, title, consumed)) = link else {
            self.nodes[opener] = Node::Fragment(TextFragment::Delimiter('['));
            self.push_fragment(TextFragment::Delimiter(']'));
            return Ok(());
        };

        self.pos += consumed;
        let mut inner: Vec<Node> = self.nodes.drain(opener + 1..).collect();
        self.nodes.pop();
        process_emphasis(&mut inner)?;
        let link = wrap(inner, |text| TextFragment::Link {
            text,
            destination,
            title,
        })?;

        // Links may not contain other links.
        for node in &mut self.nodes {
            if let Node::Bracket { active, .. } = node {
                *active = false;
            }
        }

        self.nodes.push(link);
        Ok(())
    }

    /// Looks for an inline destination or a matching reference after `]`.
    /// Returns the destination, title, and the number of bytes consumed.
    fn link_target(&self, label: &str) -> Option<(String, Option<String>, usize)> {
        let rest = self.rest();
        if rest.starts_with('(') {
            if let Some(found) = parse_inline_destination(rest) {
                return Some(found);
            }
        }

        if let Some(after) = rest.strip_prefix('[') {
            if let Some(end) = after.find(']') {
                let second = &after[..end];
                let key = if second.trim().is_empty() { label } else { second };
                return self
                    .refs
                    .get(&normalize_label(key))
                    .map(|(dest, title)| (dest.clone(), title.clone(), end + 2));
            }
        }

        self.refs
            .get(&normalize_label(label))
            .map(|(dest, title)| (dest.clone(), title.clone(), 0))
    }
}

/// Parses `(destination "title")` at the start of `s`.
fn parse_inline_destination(s: &str) -> Option<(String, Option<String>, usize)> {
    let bytes = s.as_bytes();
    let mut i = 1;
    let skip_ws = |mut i: usize| {
        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n') {
            i += 1;
        }
        i
    };

    i = skip_ws(i);
    let destination;
    if bytes.get(i) == Some(&b'<') {
        let end = s[i + 1..].find(['>', '\n'])?;
        if bytes[i + 1 + end] != b'>' {
            return None;
        }
        destination = s[i + 1..i + 1 + end].to_string();
        i += end + 2;
    } else {
        let start = i;
        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() => i += 1,
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b' ' | b'\t' | b'\n' => break,
                c if c.is_ascii_control() => return None,
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return None;
        }
        destination = unescape(&s[start..i]);
    }

    let before_title = i;
    i = skip_ws(i);
    let mut title = None;
    if i > before_title {
        if let Some(&open) = bytes.get(i) {
            let close = match open {
                b'"' => Some('"'),
                b'\'' => Some('\''),
                b'(' => Some(')'),
                _ => None,
            };
            if let Some(close) = close {
                let end = s[i + 1..].find(close)?;
                title = Some(unescape(&s[i + 1..i + 1 + end]));
                i = skip_ws(i + end + 2);
            }
        }
    }

    if bytes.get(i) == Some(&b')') {
        Some((destination, title, i + 1))
    } else {
        None
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_punctuation() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{205E}' | '\u{3001}'..='\u{3003}' | '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}' | '\u{00BF}'
        )
}

fn named_entity(name: &str) -> Option<char> {
    let ch = match name {
        "nbsp" => '\u{00A0}',
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "larr" => '\u{2190}',
        "rarr" => '\u{2192}',
        "rArr" => '\u{21D2}',
        "lambda" => '\u{03BB}',
        "times" => '\u{00D7}',
        "middot" => '\u{00B7}',
        "sect" => '\u{00A7}',
        "deg" => '\u{00B0}',
        "le" => '\u{2264}',
        "ge" => '\u{2265}',
        "ne" => '\u{2260}',
        _ => return None,
    };
    Some(ch)
}

fn run_count(node: &Node) -> usize {
    match node {
        Node::Run { count, .. } => *count,
        _ => 0,
    }
}

fn shrink_run(node: &mut Node, by: usize) {
    if let Node::Run { count, .. } = node {
        *count -= by;
    }
}

/// Slot in the opener search floors: delimiter, whether the closer can also
/// open, and the closer length modulo 3
fn floor_slot(ch: char, closer_opens: bool, closer_count: usize) -> usize {
    (usize::from(ch == '_') * 2 + usize::from(closer_opens)) * 3 + closer_count % 3
}

/// Matches emphasis delimiter runs, innermost closers first.
///
/// `floors` holds, per kind of closer, the lowest index that may still hold
/// a matching opener, so each failed search is not repeated.
fn process_emphasis(nodes: &mut Vec<Node>) -> Result<(), MarkdownError> {
    let mut floors = [0usize; 12];
    let mut closer = 0;
    while closer < nodes.len() {
        let (ch, closer_count, closer_opens) = match &nodes[closer] {
            Node::Run {
                ch,
                count,
                can_open,
                can_close: true,
            } if *count > 0 => (*ch, *count, *can_open),
            _ => {
                closer += 1;
                continue;
            }
        };

        let slot = floor_slot(ch, closer_opens, closer_count);
        let opener = (floors[slot]..closer).rev().find(|&o| match &nodes[o] {
            Node::Run {
                ch: oc,
                count,
                can_open: true,
                can_close,
            } => {
                *oc == ch
                    && *count > 0
                    && !breaks_rule_of_three(*can_close, closer_opens, *count, closer_count)
            }
            _ => false,
        });
        let Some(opener) = opener else {
            floors[slot] = closer;
            closer += 1;
            continue;
        };

        let used = if run_count(&nodes[opener]) >= 2 && closer_count >= 2 {
            2
        } else {
            1
        };
        let inner: Vec<Node> = nodes.drain(opener + 1..closer).collect();
        let wrapped = wrap(inner, |text| {
            if used == 2 {
                TextFragment::Strong(text)
            } else {
                TextFragment::Emphasis(text)
            }
        })?;
        nodes.insert(opener + 1, wrapped);
        // Everything that sat between opener and closer is gone.
        for floor in floors.iter_mut() {
            *floor = (*floor).min(opener + 1);
        }

        let mut at = opener + 2;
        shrink_run(&mut nodes[opener], used);
        shrink_run(&mut nodes[at], used);
        if run_count(&nodes[opener]) == 0 {
            nodes.remove(opener);
            at -= 1;
            for floor in floors.iter_mut() {
                if *floor > opener {
                    *floor -= 1;
                }
            }
        }
        if run_count(&nodes[at]) == 0 {
            nodes.remove(at);
        }
        closer = at;
    }
    Ok(())
}

/// Wraps matched content into a nested fragment, tracking its depth
fn wrap<F>(inner: Vec<Node>, make: F) -> Result<Node, MarkdownError>
where
    F: FnOnce(Text) -> TextFragment,
{
    let depth = inner
        .iter()
        .map(|node| match node {
            Node::Nested(_, depth) => *depth,
            _ => 0,
        })
        .max()
        .unwrap_or(0)
        + 1;
    if depth > MAX_NESTING_DEPTH {
        return Err(MarkdownError::TooDeeplyNested {
            limit: MAX_NESTING_DEPTH,
        });
    }
    Ok(Node::Nested(make(finish(inner)), depth))
}

fn breaks_rule_of_three(opener_closes: bool, closer_opens: bool, opener: usize, closer: usize) -> bool {
    (opener_closes || closer_opens) && (opener + closer) % 3 == 0 && !(opener % 3 == 0 && closer % 3 == 0)
}

/// Flattens leftover nodes into fragments
fn finish(nodes: Vec<Node>) -> Text {
    let mut text = Text::new();
    for node in nodes {
        match node {
            Node::Fragment(fragment) | Node::Nested(fragment, _) => text.push(fragment),
            Node::Run { ch, count, .. } => text.push(TextFragment::Text(ch.to_string().repeat(count))),
            Node::Bracket { .. } => text.push(TextFragment::Delimiter('[')),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Vec<TextFragment> {
        parse_inline(source, &References::new())
            .unwrap()
            .fragments()
            .to_vec()
    }

    fn text(s: &str) -> TextFragment {
        TextFragment::Text(s.to_string())
    }

    #[test]
    fn test_strong_and_emphasis() {
        assert_eq!(
            parse("**car** and *cdr*"),
            vec![
                TextFragment::Strong(Text::from("car")),
                text(" and "),
                TextFragment::Emphasis(Text::from("cdr")),
            ]
        );
    }

    #[test]
    fn test_intraword_underscore_is_literal() {
        assert_eq!(parse("string_ref x"), vec![text("string_ref x")]);
    }

    #[test]
    fn test_unmatched_brackets_are_delimiters() {
        assert_eq!(
            parse("[procedure]"),
            vec![
                TextFragment::Delimiter('['),
                text("procedure"),
                TextFragment::Delimiter(']'),
            ]
        );
    }

    #[test]
    fn test_parenthesized_strong_span() {
        assert_eq!(
            parse("**(list-tail lst k)**"),
            vec![TextFragment::Strong(Text::from(vec![
                TextFragment::Delimiter('('),
                text("list-tail lst k"),
                TextFragment::Delimiter(')'),
            ]))]
        );
    }

    #[test]
    fn test_inline_html_span() {
        let fragments = parse(r#"<span style="float:right;">[syntax]</span>"#);
        assert_eq!(
            fragments,
            vec![
                TextFragment::Html(r#"<span style="float:right;">"#.into()),
                TextFragment::Delimiter('['),
                text("syntax"),
                TextFragment::Delimiter(']'),
                TextFragment::Html("</span>".into()),
            ]
        );
    }

    #[test]
    fn test_hard_and_soft_breaks() {
        assert_eq!(
            parse("one  \ntwo\n   three"),
            vec![
                text("one"),
                TextFragment::HardBreak,
                text("two"),
                TextFragment::SoftBreak,
                text("three"),
            ]
        );
        assert_eq!(
            parse("one\\\ntwo"),
            vec![text("one"), TextFragment::HardBreak, text("two")]
        );
    }

    #[test]
    fn test_inline_link() {
        assert_eq!(
            parse(r#"see [cons](#cons "pairs") now"#),
            vec![
                text("see "),
                TextFragment::Link {
                    text: Text::from("cons"),
                    destination: "#cons".into(),
                    title: Some("pairs".into()),
                },
                text(" now"),
            ]
        );
    }

    #[test]
    fn test_reference_link() {
        let mut refs = References::new();
        refs.insert("r7rs".into(), ("https://r7rs.org".into(), None));

        let fragments = parse_inline("[R7RS] and [the report][r7rs]", &refs).unwrap();
        let link = TextFragment::Link {
            text: Text::from("R7RS"),
            destination: "https://r7rs.org".into(),
            title: None,
        };
        assert_eq!(fragments.fragments()[0], link);
        assert!(matches!(
            &fragments.fragments()[2],
            TextFragment::Link { destination, .. } if destination == "https://r7rs.org"
        ));
    }

    #[test]
    fn test_code_span_and_entities() {
        assert_eq!(
            parse("`(car x)` &amp;&nbsp;&#955;"),
            vec![
                TextFragment::Code("(car x)".into()),
                text(" &\u{a0}\u{3bb}"),
            ]
        );
    }

    #[test]
    fn test_autolink() {
        assert_eq!(
            parse("<http://lisppad.app>"),
            vec![TextFragment::AutoLink("http://lisppad.app".into())]
        );
    }

    #[test]
    fn test_unclosed_emphasis_is_literal() {
        assert_eq!(parse("a ** b"), vec![text("a ** b")]);
        assert_eq!(parse("**open"), vec![text("**open")]);
    }

    #[test]
    fn test_emphasis_depth_limit() {
        let nested = |n: usize| "*a ".repeat(n) + &" a*".repeat(n);
        assert!(parse_inline(&nested(MAX_NESTING_DEPTH), &References::new()).is_ok());
        assert_eq!(
            parse_inline(&nested(MAX_NESTING_DEPTH + 1), &References::new()),
            Err(MarkdownError::TooDeeplyNested {
                limit: MAX_NESTING_DEPTH
            })
        );
    }

    #[test]
    fn test_links_count_toward_depth() {
        let inside = "*a ".repeat(MAX_NESTING_DEPTH) + &" a*".repeat(MAX_NESTING_DEPTH);
        let link = format!("[{inside}](#deep)");
        assert!(parse_inline(&link, &References::new()).is_err());
    }

    #[test]
    fn test_unmatched_closers_stay_literal() {
        let source = "a* ".repeat(50_000);
        assert_eq!(parse(&source), vec![text(&source)]);
    }

    #[test]
    fn test_floors_keep_later_matches() {
        assert_eq!(
            parse("a* b_ *c*"),
            vec![text("a* b_ "), TextFragment::Emphasis(Text::from("c"))]
        );
    }

    #[test]
    fn test_escaped_punctuation() {
        assert_eq!(parse(r"\*not emphasis\*"), vec![text("*not emphasis*")]);
    }
}
