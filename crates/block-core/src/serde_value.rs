use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::block::{
    Block, BlockContent, BlockId, BlockType, IdAllocator, ListType, build_block, is_valid_id,
};

/// Stored form of a block: a flat record whose optional fields are present only
/// when they mean something for the block's type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlock {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_quote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<StoredBlock>>,
}

impl StoredBlock {
    fn bare(id: BlockId, block_type: BlockType) -> Self {
        Self {
            id,
            block_type,
            list_type: None,
            indent_level: None,
            checked: None,
            in_quote: None,
            html: None,
            title_html: None,
            is_open: None,
            src: None,
            children: None,
        }
    }

    pub fn from_block(block: &Block) -> Self {
        let mut out = Self::bare(block.id, block.block_type());
        match &block.content {
            BlockContent::Paragraph {
                html,
                indent_level,
                in_quote,
            } => {
                out.html = Some(html.clone());
                out.indent_level = (*indent_level > 0).then_some(*indent_level);
                out.in_quote = in_quote.then_some(true);
            }
            BlockContent::Heading { html, .. } | BlockContent::Quote { html } => {
                out.html = Some(html.clone());
            }
            BlockContent::ListItem {
                list_type,
                html,
                indent_level,
            } => {
                out.list_type = Some(*list_type);
                out.indent_level = Some(*indent_level);
                out.html = Some(html.clone());
            }
            BlockContent::Todo {
                html,
                checked,
                indent_level,
            } => {
                out.checked = Some(*checked);
                out.indent_level = Some(*indent_level);
                out.html = Some(html.clone());
            }
            BlockContent::Toggle {
                title_html,
                is_open,
                children,
            } => {
                out.title_html = Some(title_html.clone());
                out.is_open = Some(*is_open);
                out.children = Some(serialize_blocks(children));
            }
            BlockContent::Callout { children } => {
                out.children = Some(serialize_blocks(children));
            }
            BlockContent::Image { src } => {
                out.src = src.clone();
            }
        }
        out
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn serialize_blocks(blocks: &[Block]) -> Vec<StoredBlock> {
    blocks.iter().map(StoredBlock::from_block).collect()
}

pub fn serialize_to_values(blocks: &[Block]) -> Vec<Value> {
    serialize_blocks(blocks)
        .iter()
        .map(StoredBlock::to_value)
        .collect()
}

/// Rebuilds blocks from stored JSON.
///
/// Entries that are not objects or carry no known `type` are skipped with a
/// warning, at any depth. Ids are kept when they are in range and unseen in this
/// load; the allocator ends up past the largest id encountered.
pub fn deserialize_blocks(stored: &[Value], ids: &mut IdAllocator) -> Vec<Block> {
    // Fresh ids handed out below must not collide with stored ids further on.
    observe_stored_ids(stored, ids);
    let mut seen: HashSet<BlockId> = HashSet::new();
    deserialize_list(stored, ids, &mut seen)
}

fn observe_stored_ids(stored: &[Value], ids: &mut IdAllocator) {
    for value in stored {
        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            ids.observe(id);
        }
        if let Some(children) = value.get("children").and_then(Value::as_array) {
            observe_stored_ids(children, ids);
        }
    }
}

fn deserialize_list(
    stored: &[Value],
    ids: &mut IdAllocator,
    seen: &mut HashSet<BlockId>,
) -> Vec<Block> {
    stored
        .iter()
        .enumerate()
        .filter_map(|(ix, value)| deserialize_one(ix, value, ids, seen))
        .collect()
}

fn deserialize_one(
    ix: usize,
    value: &Value,
    ids: &mut IdAllocator,
    seen: &mut HashSet<BlockId>,
) -> Option<Block> {
    let Some(obj) = value.as_object() else {
        warn!(index = ix, "skipping stored block that is not an object");
        return None;
    };
    let type_name = obj.get("type").and_then(Value::as_str);
    if type_name.and_then(BlockType::parse).is_none() {
        warn!(index = ix, kind = ?type_name, "skipping stored block without a known type");
        return None;
    }

    let stored_id = obj
        .get("id")
        .and_then(Value::as_u64)
        .filter(|id| is_valid_id(*id));
    let deduped;
    let value = match stored_id {
        Some(id) if seen.contains(&id) => {
            warn!(id, "reassigning duplicate block id");
            let mut copy = obj.clone();
            copy.remove("id");
            deduped = Value::Object(copy);
            &deduped
        }
        Some(id) => {
            seen.insert(id);
            value
        }
        None => {
            if obj.contains_key("id") {
                warn!(index = ix, "replacing invalid block id");
            }
            value
        }
    };

    let block = build_block(value, ids, &mut |children, ids| {
        children
            .and_then(Value::as_array)
            .map(|items| deserialize_list(items, ids, seen))
            .unwrap_or_default()
    });
    seen.insert(block.id);
    Some(block)
}

/// The persisted document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_blocks: Vec<Value>,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub comments: Vec<Value>,
}

impl DocumentRecord {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            content_blocks: Vec::new(),
            keywords: String::new(),
            comments: Vec::new(),
        }
    }

    pub fn set_blocks(&mut self, blocks: &[StoredBlock]) {
        self.content_blocks = blocks.iter().map(StoredBlock::to_value).collect();
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
