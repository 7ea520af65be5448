//! Derived, render-only state recomputed after every mutation: ordered list
//! markers, quote joins and placeholder visibility.

use std::collections::HashMap;

use crate::block::{Block, BlockContent, BlockId, ListType};
use crate::inline;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockDecoration {
    pub list_marker: Option<String>,
    /// Draw without the gap that normally separates this block from the one above.
    pub joined_to_previous: bool,
    pub show_placeholder: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorations {
    by_block: HashMap<BlockId, BlockDecoration>,
}

impl Decorations {
    pub fn get(&self, id: BlockId) -> BlockDecoration {
        self.by_block.get(&id).cloned().unwrap_or_default()
    }

    pub fn list_marker(&self, id: BlockId) -> Option<&str> {
        self.by_block
            .get(&id)
            .and_then(|decoration| decoration.list_marker.as_deref())
    }

    pub fn entry(&mut self, id: BlockId) -> &mut BlockDecoration {
        self.by_block.entry(id).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &BlockDecoration)> {
        self.by_block.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecorationContext {
    pub focused: Option<BlockId>,
    pub initial_placeholder: Option<BlockId>,
}

/// One pass over a single sibling list. Passes own one field of
/// [`BlockDecoration`] each and must overwrite it for every block they see.
pub trait DecorationPass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, siblings: &[Block], ctx: &DecorationContext, out: &mut Decorations);
}

pub struct ListNumbering;

impl DecorationPass for ListNumbering {
    fn id(&self) -> &'static str {
        "list.numbering"
    }

    fn run(&self, siblings: &[Block], _ctx: &DecorationContext, out: &mut Decorations) {
        for (block, marker) in siblings.iter().zip(compute_numbers(siblings)) {
            out.entry(block.id).list_marker = marker;
        }
    }
}

/// Markers for one sibling list, positionally aligned with `siblings`.
///
/// Counters are kept per indent level. Any sibling that is not an ordered list
/// item resets every level; an ordered item drops the counters of all deeper
/// levels, so a nested run restarts each time its parent advances, while a
/// shallower level carries on from where it stopped.
pub fn compute_numbers(siblings: &[Block]) -> Vec<Option<String>> {
    let mut counters: Vec<usize> = Vec::new();
    siblings
        .iter()
        .map(|block| match &block.content {
            BlockContent::ListItem {
                list_type: ListType::Ordered,
                indent_level,
                ..
            } => {
                let level = *indent_level as usize;
                counters.resize(level + 1, 0);
                counters[level] += 1;
                Some(format_marker(level, counters[level]))
            }
            _ => {
                counters.clear();
                None
            }
        })
        .collect()
}

/// Decimal, then lower alpha, then lower roman, cycling with depth.
pub fn format_marker(level: usize, counter: usize) -> String {
    match level % 3 {
        0 => counter.to_string(),
        1 => to_alpha(counter),
        _ => to_roman(counter),
    }
}

/// Bijective base 26: `z` is followed by `aa`.
fn to_alpha(counter: usize) -> String {
    let mut n = counter.max(1);
    let mut digits = Vec::new();
    while n > 0 {
        n -= 1;
        digits.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

const ROMAN: [(usize, &str); 13] = [
    (1000, "m"),
    (900, "cm"),
    (500, "d"),
    (400, "cd"),
    (100, "c"),
    (90, "xc"),
    (50, "l"),
    (40, "xl"),
    (10, "x"),
    (9, "ix"),
    (5, "v"),
    (4, "iv"),
    (1, "i"),
];

fn to_roman(counter: usize) -> String {
    let mut n = counter.clamp(1, 3999);
    let mut out = String::new();
    for (value, numeral) in ROMAN {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

pub struct QuoteAdjacency;

impl DecorationPass for QuoteAdjacency {
    fn id(&self) -> &'static str {
        "quote.adjacency"
    }

    fn run(&self, siblings: &[Block], _ctx: &DecorationContext, out: &mut Decorations) {
        let mut prev_is_quote = false;
        for block in siblings {
            let is_quote = block.is_quote();
            out.entry(block.id).joined_to_previous = is_quote && prev_is_quote;
            prev_is_quote = is_quote;
        }
    }
}

pub struct PlaceholderVisibility;

impl DecorationPass for PlaceholderVisibility {
    fn id(&self) -> &'static str {
        "placeholder.visibility"
    }

    fn run(&self, siblings: &[Block], ctx: &DecorationContext, out: &mut Decorations) {
        for block in siblings {
            let show = match block.html() {
                Some(html) if inline::is_blank(html) => match block.content {
                    BlockContent::Paragraph { .. } => {
                        ctx.focused == Some(block.id) || ctx.initial_placeholder == Some(block.id)
                    }
                    _ => true,
                },
                _ => false,
            };
            out.entry(block.id).show_placeholder = show;
        }
    }
}
