use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inline;

pub type BlockId = u64;

/// Largest id a stored document may carry (2^53 - 1, exact in every JSON reader).
pub const MAX_BLOCK_ID: BlockId = (1 << 53) - 1;

/// Ids outside `1..=MAX_BLOCK_ID` are treated as missing and reassigned.
pub fn is_valid_id(id: BlockId) -> bool {
    (1..=MAX_BLOCK_ID).contains(&id)
}

/// Hands out block ids for the lifetime of a session.
///
/// The counter only moves forward: restoring a block whose id is at or past the
/// counter bumps it, so later allocations never collide with stored ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: BlockId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: BlockId) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> BlockId {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    pub fn observe(&mut self, id: BlockId) {
        if is_valid_id(id) && id >= self.next {
            self.next = id.saturating_add(1);
        }
    }

    pub fn peek(&self) -> BlockId {
        self.next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    #[serde(rename = "p")]
    Paragraph,
    #[serde(rename = "h1")]
    H1,
    #[serde(rename = "h2")]
    H2,
    #[serde(rename = "h3")]
    H3,
    #[serde(rename = "li")]
    ListItem,
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "quote")]
    Quote,
    #[serde(rename = "toggle")]
    Toggle,
    #[serde(rename = "callout")]
    Callout,
    #[serde(rename = "image")]
    Image,
}

impl BlockType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "p" => Self::Paragraph,
            "h1" => Self::H1,
            "h2" => Self::H2,
            "h3" => Self::H3,
            "li" => Self::ListItem,
            "todo" => Self::Todo,
            "quote" => Self::Quote,
            "toggle" => Self::Toggle,
            "callout" => Self::Callout,
            "image" => Self::Image,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paragraph => "p",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::ListItem => "li",
            Self::Todo => "todo",
            Self::Quote => "quote",
            Self::Toggle => "toggle",
            Self::Callout => "callout",
            Self::Image => "image",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, Self::Toggle | Self::Callout)
    }

    pub fn is_heading(self) -> bool {
        matches!(self, Self::H1 | Self::H2 | Self::H3)
    }

    /// Types a quote-grouped block may never become.
    pub fn forbidden_in_quote(self) -> bool {
        matches!(
            self,
            Self::ListItem
                | Self::Todo
                | Self::H1
                | Self::H2
                | Self::H3
                | Self::Toggle
                | Self::Callout
                | Self::Image
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListType {
    #[serde(rename = "ol")]
    Ordered,
    #[serde(rename = "ul")]
    Unordered,
}

impl ListType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ol" => Some(Self::Ordered),
            "ul" => Some(Self::Unordered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    One,
    Two,
    Three,
}

impl HeadingLevel {
    pub fn block_type(self) -> BlockType {
        match self {
            Self::One => BlockType::H1,
            Self::Two => BlockType::H2,
            Self::Three => BlockType::H3,
        }
    }

    pub fn from_block_type(ty: BlockType) -> Option<Self> {
        match ty {
            BlockType::H1 => Some(Self::One),
            BlockType::H2 => Some(Self::Two),
            BlockType::H3 => Some(Self::Three),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Paragraph {
        html: String,
        indent_level: u8,
        in_quote: bool,
    },
    Heading {
        level: HeadingLevel,
        html: String,
    },
    ListItem {
        list_type: ListType,
        html: String,
        indent_level: u8,
    },
    Todo {
        html: String,
        checked: bool,
        indent_level: u8,
    },
    Quote {
        html: String,
    },
    Toggle {
        title_html: String,
        is_open: bool,
        children: Vec<Block>,
    },
    Callout {
        children: Vec<Block>,
    },
    Image {
        src: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub content: BlockContent,
}

impl Block {
    pub fn new(id: BlockId, content: BlockContent) -> Self {
        Self { id, content }
    }

    pub fn paragraph(id: BlockId, html: impl Into<String>) -> Self {
        Self::new(
            id,
            BlockContent::Paragraph {
                html: html.into(),
                indent_level: 0,
                in_quote: false,
            },
        )
    }

    pub fn heading(id: BlockId, level: HeadingLevel, html: impl Into<String>) -> Self {
        Self::new(
            id,
            BlockContent::Heading {
                level,
                html: html.into(),
            },
        )
    }

    pub fn list_item(
        id: BlockId,
        list_type: ListType,
        indent_level: u8,
        html: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            BlockContent::ListItem {
                list_type,
                html: html.into(),
                indent_level,
            },
        )
    }

    pub fn todo(id: BlockId, checked: bool, html: impl Into<String>) -> Self {
        Self::new(
            id,
            BlockContent::Todo {
                html: html.into(),
                checked,
                indent_level: 0,
            },
        )
    }

    pub fn quote(id: BlockId, html: impl Into<String>) -> Self {
        Self::new(id, BlockContent::Quote { html: html.into() })
    }

    pub fn toggle(id: BlockId, title_html: impl Into<String>, children: Vec<Block>) -> Self {
        Self::new(
            id,
            BlockContent::Toggle {
                title_html: title_html.into(),
                is_open: false,
                children,
            },
        )
    }

    pub fn callout(id: BlockId, children: Vec<Block>) -> Self {
        Self::new(id, BlockContent::Callout { children })
    }

    pub fn image(id: BlockId, src: Option<String>) -> Self {
        Self::new(id, BlockContent::Image { src })
    }

    pub fn block_type(&self) -> BlockType {
        match &self.content {
            BlockContent::Paragraph { .. } => BlockType::Paragraph,
            BlockContent::Heading { level, .. } => level.block_type(),
            BlockContent::ListItem { .. } => BlockType::ListItem,
            BlockContent::Todo { .. } => BlockType::Todo,
            BlockContent::Quote { .. } => BlockType::Quote,
            BlockContent::Toggle { .. } => BlockType::Toggle,
            BlockContent::Callout { .. } => BlockType::Callout,
            BlockContent::Image { .. } => BlockType::Image,
        }
    }

    pub fn list_type(&self) -> Option<ListType> {
        match &self.content {
            BlockContent::ListItem { list_type, .. } => Some(*list_type),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.block_type().is_container()
    }

    /// `type = quote`, or a paragraph flagged as part of a quote run.
    pub fn is_quote(&self) -> bool {
        matches!(
            self.content,
            BlockContent::Quote { .. } | BlockContent::Paragraph { in_quote: true, .. }
        )
    }

    pub fn is_list_like(&self) -> bool {
        matches!(
            self.content,
            BlockContent::ListItem { .. } | BlockContent::Todo { .. }
        )
    }

    pub fn indent_level(&self) -> u8 {
        match &self.content {
            BlockContent::Paragraph { indent_level, .. }
            | BlockContent::ListItem { indent_level, .. }
            | BlockContent::Todo { indent_level, .. } => *indent_level,
            _ => 0,
        }
    }

    /// Returns false for variants pinned at depth 0.
    pub fn set_indent_level(&mut self, level: u8) -> bool {
        match &mut self.content {
            BlockContent::Paragraph { indent_level, .. }
            | BlockContent::ListItem { indent_level, .. }
            | BlockContent::Todo { indent_level, .. } => {
                *indent_level = level;
                true
            }
            _ => false,
        }
    }

    /// The editable inline content: the html of a leaf, the title of a toggle.
    pub fn html(&self) -> Option<&str> {
        match &self.content {
            BlockContent::Paragraph { html, .. }
            | BlockContent::Heading { html, .. }
            | BlockContent::ListItem { html, .. }
            | BlockContent::Todo { html, .. }
            | BlockContent::Quote { html } => Some(html),
            BlockContent::Toggle { title_html, .. } => Some(title_html),
            BlockContent::Callout { .. } | BlockContent::Image { .. } => None,
        }
    }

    pub fn html_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            BlockContent::Paragraph { html, .. }
            | BlockContent::Heading { html, .. }
            | BlockContent::ListItem { html, .. }
            | BlockContent::Todo { html, .. }
            | BlockContent::Quote { html } => Some(html),
            BlockContent::Toggle { title_html, .. } => Some(title_html),
            BlockContent::Callout { .. } | BlockContent::Image { .. } => None,
        }
    }

    /// Text a container hands over when it is turned into something else.
    pub fn primary_html(&self) -> String {
        match &self.content {
            BlockContent::Callout { children } => children
                .first()
                .and_then(|child| child.html())
                .unwrap_or_default()
                .to_string(),
            _ => self.html().unwrap_or_default().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match &self.content {
            BlockContent::Image { src } => src.is_none(),
            BlockContent::Callout { children } => children.iter().all(Block::is_blank),
            _ => self.html().is_none_or(inline::is_blank),
        }
    }

    pub fn children(&self) -> Option<&[Block]> {
        match &self.content {
            BlockContent::Toggle { children, .. } | BlockContent::Callout { children } => {
                Some(children)
            }
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match &mut self.content {
            BlockContent::Toggle { children, .. } | BlockContent::Callout { children } => {
                Some(children)
            }
            _ => None,
        }
    }
}

/// Fills a complete block from an arbitrary, possibly partial, JSON object.
///
/// Nothing is rejected: unknown types fall back to a paragraph and fields of the
/// wrong shape fall back to their defaults. Containers always come out with at
/// least one child.
pub fn normalize(partial: &Value, ids: &mut IdAllocator) -> Block {
    build_block(partial, ids, &mut normalize_children)
}

/// Shared by [`normalize`] and the stored-document loader, which differ only in
/// how they treat child entries.
pub(crate) fn build_block(
    partial: &Value,
    ids: &mut IdAllocator,
    children_of: &mut dyn FnMut(Option<&Value>, &mut IdAllocator) -> Vec<Block>,
) -> Block {
    let obj = partial.as_object();
    let field = |key: &str| obj.and_then(|o| o.get(key));
    let str_field = |key: &str| {
        field(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let bool_field = |key: &str| field(key).and_then(Value::as_bool).unwrap_or(false);

    let id = match field("id").and_then(Value::as_u64) {
        Some(id) if is_valid_id(id) => {
            ids.observe(id);
            id
        }
        _ => ids.next_id(),
    };

    let ty = field("type")
        .and_then(Value::as_str)
        .and_then(BlockType::parse)
        .unwrap_or(BlockType::Paragraph);
    let indent_level = field("indentLevel")
        .and_then(Value::as_u64)
        .map(|level| level.min(u8::MAX as u64) as u8)
        .unwrap_or(0);
    let html = str_field("html");

    let content = match ty {
        BlockType::Paragraph => BlockContent::Paragraph {
            html,
            indent_level,
            in_quote: bool_field("inQuote"),
        },
        BlockType::H1 | BlockType::H2 | BlockType::H3 => BlockContent::Heading {
            level: HeadingLevel::from_block_type(ty).unwrap_or(HeadingLevel::One),
            html,
        },
        BlockType::ListItem => BlockContent::ListItem {
            list_type: field("listType")
                .and_then(Value::as_str)
                .and_then(ListType::parse)
                .unwrap_or(ListType::Unordered),
            html,
            indent_level,
        },
        BlockType::Todo => BlockContent::Todo {
            html,
            checked: bool_field("checked"),
            indent_level,
        },
        BlockType::Quote => BlockContent::Quote { html },
        BlockType::Toggle => BlockContent::Toggle {
            title_html: str_field("titleHtml"),
            is_open: bool_field("isOpen"),
            children: with_default_child(children_of(field("children"), ids), ids),
        },
        BlockType::Callout => BlockContent::Callout {
            children: with_default_child(children_of(field("children"), ids), ids),
        },
        BlockType::Image => BlockContent::Image {
            src: field("src")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        },
    };

    Block { id, content }
}

fn normalize_children(value: Option<&Value>, ids: &mut IdAllocator) -> Vec<Block> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| normalize(item, ids)).collect())
        .unwrap_or_default()
}

fn with_default_child(mut children: Vec<Block>, ids: &mut IdAllocator) -> Vec<Block> {
    if children.is_empty() {
        children.push(Block::paragraph(ids.next_id(), ""));
    }
    children
}
