//! Operations on the inline markup subset held by leaf blocks.
//!
//! Markup is parsed with html5ever and re-serialized, so entities come back
//! decoded and attribute quoting is normalized. Offsets are counted in visible
//! characters: tags contribute nothing, an entity such as `&amp;` or `&#32;`
//! counts as one character.

use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open { name: String, raw: String },
    Close { name: String },
    Void { raw: String },
    /// Decoded text.
    Text(String),
}

impl Token {
    fn write(&self, out: &mut String) {
        match self {
            Token::Open { raw, .. } | Token::Void { raw } => out.push_str(raw),
            Token::Close { name } => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Token::Text(text) => {
                for c in text.chars() {
                    match c {
                        '&' => out.push_str("&amp;"),
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        '\u{a0}' => out.push_str("&nbsp;"),
                        c => out.push(c),
                    }
                }
            }
        }
    }
}

const VOID_TAGS: &[&str] = &["br", "img", "hr", "wbr"];

fn tokenize(html: &str) -> Vec<Token> {
    let dom = parse_document(RcDom::default(), Default::default()).one(format!("<body>{html}"));
    let mut tokens = Vec::new();
    if let Some(body) = find_body(&dom.document) {
        for child in body.children.borrow().iter() {
            push_tokens(child, &mut tokens);
        }
    }
    tokens
}

fn find_body(handle: &Handle) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &handle.data
        && &*name.local == "body"
    {
        return Some(handle.clone());
    }
    handle.children.borrow().iter().find_map(find_body)
}

fn push_tokens(handle: &Handle, tokens: &mut Vec<Token>) {
    match &handle.data {
        NodeData::Text { contents } => push_text(tokens, &contents.borrow()),
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();
            let raw = open_tag(&tag, &attrs.borrow());
            if VOID_TAGS.contains(&tag.as_str()) {
                tokens.push(Token::Void { raw });
                return;
            }
            tokens.push(Token::Open {
                name: tag.clone(),
                raw,
            });
            for child in handle.children.borrow().iter() {
                push_tokens(child, tokens);
            }
            tokens.push(Token::Close { name: tag });
        }
        _ => {}
    }
}

fn push_text(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    match tokens.last_mut() {
        Some(Token::Text(prev)) => prev.push_str(text),
        _ => tokens.push(Token::Text(text.to_string())),
    }
}

fn open_tag(name: &str, attrs: &[Attribute]) -> String {
    let mut raw = format!("<{name}");
    for attr in attrs {
        raw.push(' ');
        raw.push_str(&attr.name.local);
        raw.push_str("=\"");
        for c in attr.value.chars() {
            match c {
                '&' => raw.push_str("&amp;"),
                '"' => raw.push_str("&quot;"),
                c => raw.push(c),
            }
        }
        raw.push('"');
    }
    raw.push('>');
    raw
}

/// Serializes tokens, dropping element pairs that enclose nothing, e.g. `<b></b>`
/// left behind by a split.
fn render(tokens: Vec<Token>) -> String {
    let mut kept: Vec<Token> = Vec::new();
    for token in tokens {
        if let Token::Close { name } = &token
            && matches!(kept.last(), Some(Token::Open { name: open, .. }) if open == name)
        {
            kept.pop();
            continue;
        }
        kept.push(token);
    }
    let mut out = String::new();
    for token in &kept {
        token.write(&mut out);
    }
    out
}

pub fn text_len(html: &str) -> usize {
    tokenize(html)
        .iter()
        .map(|token| match token {
            Token::Text(text) => text.chars().count(),
            _ => 0,
        })
        .sum()
}

pub fn plain_text(html: &str) -> String {
    tokenize(html)
        .into_iter()
        .filter_map(|token| match token {
            Token::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

/// True when there is no visible text: only whitespace, `<br>` or empty wrappers.
pub fn is_blank(html: &str) -> bool {
    plain_text(html).trim().is_empty()
}

/// Splits at a visible-character offset. Tags open at the split point are closed
/// on the left and reopened on the right, so both halves stay well formed.
pub fn split_at(html: &str, offset: usize) -> (String, String) {
    let mut before: Vec<Token> = Vec::new();
    let mut after: Vec<Token> = Vec::new();
    let mut stack: Vec<(String, String)> = Vec::new();
    let mut seen = 0usize;
    let mut split = false;

    for token in tokenize(html) {
        if split {
            after.push(token);
            continue;
        }

        match token {
            Token::Open { name, raw } => {
                if seen == offset && offset > 0 {
                    split = true;
                    close_open(&stack, &mut before, &mut after);
                    after.push(Token::Open { name, raw });
                    continue;
                }
                before.push(Token::Open {
                    name: name.clone(),
                    raw: raw.clone(),
                });
                stack.push((name, raw));
            }
            Token::Close { name } => {
                stack.pop();
                before.push(Token::Close { name });
            }
            Token::Void { raw } => {
                if seen == offset && offset > 0 {
                    split = true;
                    close_open(&stack, &mut before, &mut after);
                    after.push(Token::Void { raw });
                    continue;
                }
                before.push(Token::Void { raw });
            }
            Token::Text(text) => {
                let len = text.chars().count();
                if seen + len < offset || (seen + len == offset && offset > 0) {
                    seen += len;
                    before.push(Token::Text(text));
                    continue;
                }
                let cut = text
                    .char_indices()
                    .nth(offset.saturating_sub(seen))
                    .map_or(text.len(), |(ix, _)| ix);
                let (left, right) = text.split_at(cut);
                if !left.is_empty() {
                    before.push(Token::Text(left.to_string()));
                }
                close_open(&stack, &mut before, &mut after);
                if !right.is_empty() {
                    after.push(Token::Text(right.to_string()));
                }
                split = true;
            }
        }
    }

    (render(before), render(after))
}

/// Closes the open elements on the left and reopens them on the right.
fn close_open(stack: &[(String, String)], before: &mut Vec<Token>, after: &mut Vec<Token>) {
    before.extend(
        stack
            .iter()
            .rev()
            .map(|(name, _)| Token::Close { name: name.clone() }),
    );
    after.extend(stack.iter().map(|(name, raw)| Token::Open {
        name: name.clone(),
        raw: raw.clone(),
    }));
}

/// Appends `right` to `left` for a merge. A blank left side is replaced outright
/// and a trailing `<br>` on the left is dropped.
pub fn concat(left: &str, right: &str) -> String {
    if is_blank(left) {
        return right.to_string();
    }
    let mut out = left.to_string();
    for suffix in ["<br>", "<br/>", "<br />"] {
        if out.ends_with(suffix) {
            out.truncate(out.len() - suffix.len());
            break;
        }
    }
    out.push_str(right);
    out
}
