use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::block::{Block, BlockId, IdAllocator};
use crate::decorate::{BlockDecoration, DecorationContext, Decorations};
use crate::error::{ApplyError, PathError};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::PassRegistry;
use crate::serde_value::{StoredBlock, deserialize_blocks, serialize_blocks, serialize_to_values};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaretOffset {
    Start,
    End,
    At(usize),
}

/// Where input focus sits: a block and a visible-character position in its
/// inline content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caret {
    pub block: BlockId,
    pub offset: CaretOffset,
}

impl Caret {
    pub fn start(block: BlockId) -> Self {
        Self {
            block,
            offset: CaretOffset::Start,
        }
    }

    pub fn end(block: BlockId) -> Self {
        Self {
            block,
            offset: CaretOffset::End,
        }
    }

    pub fn at(block: BlockId, offset: usize) -> Self {
        Self {
            block,
            offset: CaretOffset::At(offset),
        }
    }
}

/// The sibling list a block lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Root,
    Toggle(BlockId),
    Callout(BlockId),
}

impl Scope {
    pub fn is_container(self) -> bool {
        !matches!(self, Scope::Root)
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub caret_before: Option<Caret>,
    pub caret_after: Option<Caret>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    pub max_indent: u8,
    pub max_ordered_list_indent: u8,
    pub max_unordered_list_indent: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: 0,
            max_normalize_iterations: 0,
            max_indent: 0,
            max_ordered_list_indent: 0,
            max_unordered_list_indent: 0,
        }
        .with_defaults()
    }
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        if self.max_indent == 0 {
            self.max_indent = 8;
        }
        if self.max_ordered_list_indent == 0 {
            self.max_ordered_list_indent = 2;
        }
        if self.max_unordered_list_indent == 0 {
            self.max_unordered_list_indent = 2;
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(s).map(Self::with_defaults)
    }
}

/// Summary of a [`Editor::load_document`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// The stored block list was empty and a default paragraph was created;
    /// the caller should write the document back.
    pub healed_empty: bool,
    /// Loading changed the stored blocks (ids reassigned, nesting or indents
    /// repaired); the caller should write the document back.
    pub repaired: bool,
}

impl LoadOutcome {
    pub fn needs_write_back(&self) -> bool {
        self.healed_empty || self.repaired
    }
}

pub struct Editor {
    blocks: Vec<Block>,
    ids: IdAllocator,
    caret: Option<Caret>,
    registry: PassRegistry,
    config: EditorConfig,
    decorations: Decorations,
    initial_placeholder: Option<BlockId>,
    flash: Option<BlockId>,
    dirty: bool,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let mut editor = Self {
            blocks: Vec::new(),
            ids: IdAllocator::new(),
            caret: None,
            registry: PassRegistry::standard(),
            config: config.with_defaults(),
            decorations: Decorations::default(),
            initial_placeholder: None,
            flash: None,
            dirty: false,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        let mut editor = Self::default();
        for block in &blocks {
            observe_ids(block, &mut editor.ids);
        }
        editor.blocks = blocks;
        editor.normalize_in_place();
        editor
    }

    pub fn with_registry(mut self, registry: PassRegistry) -> Self {
        self.registry = registry;
        self.normalize_in_place();
        self
    }

    /// Replaces the live tree with the stored blocks of another document. The id
    /// allocator is kept, so ids stay unique across every document opened in
    /// this session.
    pub fn load_document(&mut self, stored: &[Value]) -> LoadOutcome {
        self.blocks = deserialize_blocks(stored, &mut self.ids);
        let healed_empty = self.blocks.is_empty();
        if healed_empty {
            self.blocks.push(Block::paragraph(self.ids.next_id(), ""));
        }
        self.caret = None;
        self.flash = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.normalize_in_place();
        self.initial_placeholder = match self.blocks.as_slice() {
            [only] if only.html().is_some() && only.is_blank() => Some(only.id),
            _ => None,
        };
        self.refresh_decorations();
        let repaired = !healed_empty && serialize_to_values(&self.blocks) != stored;
        if repaired {
            debug!(blocks = self.blocks.len(), "stored document was repaired on load");
        }
        self.dirty = healed_empty || repaired;
        LoadOutcome {
            healed_empty,
            repaired,
        }
    }

    pub fn serialize_document(&self) -> Vec<StoredBlock> {
        serialize_blocks(&self.blocks)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        find_path(&self.blocks, id).and_then(|path| block_at(&self.blocks, &path))
    }

    pub fn path_of(&self, id: BlockId) -> Option<Path> {
        find_path(&self.blocks, id)
    }

    pub fn scope_of(&self, id: BlockId) -> Option<Scope> {
        let path = self.path_of(id)?;
        Some(scope_for_path(&self.blocks, &path))
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdAllocator {
        &mut self.ids
    }

    pub fn caret(&self) -> Option<Caret> {
        self.caret
    }

    pub fn set_caret(&mut self, caret: Option<Caret>) {
        self.caret = caret;
        self.normalize_caret_in_place();
        self.refresh_decorations();
    }

    pub fn decorations(&self) -> &Decorations {
        &self.decorations
    }

    pub fn decoration(&self, id: BlockId) -> BlockDecoration {
        self.decorations.get(id)
    }

    pub fn initial_placeholder(&self) -> Option<BlockId> {
        self.initial_placeholder
    }

    /// Takes the block that should briefly highlight after a refused edit.
    pub fn take_flash(&mut self) -> Option<BlockId> {
        self.flash.take()
    }

    pub(crate) fn flash(&mut self, id: BlockId) {
        self.flash = Some(id);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            caret_before,
            caret_after,
        } = record;

        let mut redo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                redo_ops.push(inv);
            } else {
                break;
            }
        }
        redo_ops.reverse();

        self.caret = caret_before;
        self.finish_history_step();

        self.redo_stack.push(UndoRecord {
            caret_before,
            caret_after,
            inverse_ops: redo_ops,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };

        let UndoRecord {
            inverse_ops,
            caret_before,
            caret_after,
        } = record;

        let mut undo_ops: Vec<Op> = Vec::new();
        for op in inverse_ops.iter().cloned() {
            if let Ok(inv) = self.apply_op(op) {
                undo_ops.push(inv);
            } else {
                break;
            }
        }
        undo_ops.reverse();

        self.caret = caret_after;
        self.finish_history_step();

        self.undo_stack.push(UndoRecord {
            caret_before,
            caret_after,
            inverse_ops: undo_ops,
        });
        true
    }

    fn finish_history_step(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops(&mut Vec::new()) {
            warn!(%err, "normalize after history step failed");
        }
        self.normalize_caret_in_place();
        self.refresh_decorations();
        self.dirty = true;
    }

    /// Applies every op or none of them, then normalizes, refreshes decorations
    /// and records an undo step.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let caret_before = self.caret;

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops.iter().cloned() {
            match self.apply_op(op) {
                Ok(inv) => inverse_ops.push(inv),
                Err(err) => {
                    self.rollback(inverse_ops);
                    return Err(err);
                }
            }
        }

        if let Some(caret) = tx.caret_after {
            self.caret = Some(caret);
        }

        if let Err(err) = self.normalize_with_inverse_ops(&mut inverse_ops) {
            self.rollback(inverse_ops);
            self.caret = caret_before;
            return Err(err);
        }
        inverse_ops.reverse();

        self.normalize_caret_in_place();
        self.refresh_decorations();

        debug!(
            source = tx.meta.source.as_deref().unwrap_or("direct"),
            ops = tx.ops.len(),
            "applied transaction"
        );

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            caret_before,
            caret_after: self.caret,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        self.dirty = true;

        Ok(())
    }

    fn rollback(&mut self, applied_inverse: Vec<Op>) {
        for op in applied_inverse.into_iter().rev() {
            if let Err(err) = self.apply_op(op) {
                warn!(%err, "rollback step failed");
            }
        }
    }

    /// Recomputes list markers, quote joins and placeholders for the whole tree.
    pub fn refresh_decorations(&mut self) {
        if let Some(id) = self.initial_placeholder {
            let still_valid = match self.blocks.as_slice() {
                [only] => {
                    only.id == id
                        && only.is_blank()
                        && self.caret.is_none_or(|caret| caret.block != id)
                }
                _ => false,
            };
            if !still_valid {
                self.initial_placeholder = None;
            }
        }

        let ctx = DecorationContext {
            focused: self.caret.map(|caret| caret.block),
            initial_placeholder: self.initial_placeholder,
        };
        self.decorations = self.registry.decorate(&self.blocks, &ctx);
    }

    /// Recomputes decorations for the sibling list that holds `id` only.
    pub fn refresh_decorations_around(&mut self, id: BlockId) {
        let Some(path) = self.path_of(id) else {
            return;
        };
        let ctx = DecorationContext {
            focused: self.caret.map(|caret| caret.block),
            initial_placeholder: self.initial_placeholder,
        };
        let parent = &path[..path.len() - 1];
        let Ok(siblings) = children_at(&self.blocks, parent) else {
            return;
        };
        self.registry
            .decorate_scope(siblings, &ctx, &mut self.decorations);
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops(&mut Vec::new()) {
            warn!(%err, "initial normalize failed");
        }
        self.normalize_caret_in_place();
        self.refresh_decorations();
    }

    fn normalize_caret_in_place(&mut self) {
        if let Some(caret) = self.caret {
            if find_path(&self.blocks, caret.block).is_none() {
                self.caret = first_leaf(&self.blocks).map(|block| Caret::start(block.id));
            }
        }
    }

    /// Inverses are appended as ops apply, so a failure part way through still
    /// leaves `inverse_ops` able to undo everything done so far.
    fn normalize_with_inverse_ops(&mut self, inverse_ops: &mut Vec<Op>) -> Result<(), ApplyError> {
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self
                .registry
                .normalize(&self.blocks, &self.config, &mut self.ids);
            if ops.is_empty() {
                return Ok(());
            }
            for op in ops {
                let inv = self.apply_op(op)?;
                inverse_ops.push(inv);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.blocks, op)
    }
}

fn observe_ids(block: &Block, ids: &mut IdAllocator) {
    ids.observe(block.id);
    for child in block.children().unwrap_or_default() {
        observe_ids(child, ids);
    }
}

pub(crate) fn apply_op_to(blocks: &mut Vec<Block>, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertBlock { path, block } => {
            insert_block(blocks, &path, block)?;
            Ok(Op::RemoveBlock { path })
        }
        Op::RemoveBlock { path } => {
            let removed = remove_block(blocks, &path)?;
            Ok(Op::InsertBlock {
                path,
                block: removed,
            })
        }
        Op::ReplaceBlock { path, block } => {
            let slot = block_at_mut(blocks, &path)?;
            let old = std::mem::replace(slot, block);
            Ok(Op::ReplaceBlock { path, block: old })
        }
    }
}

pub(crate) fn find_path(blocks: &[Block], id: BlockId) -> Option<Path> {
    fn walk(blocks: &[Block], id: BlockId, path: &mut Path) -> bool {
        for (ix, block) in blocks.iter().enumerate() {
            path.push(ix);
            if block.id == id {
                return true;
            }
            if let Some(children) = block.children() {
                if walk(children, id, path) {
                    return true;
                }
            }
            path.pop();
        }
        false
    }

    let mut path = Vec::new();
    walk(blocks, id, &mut path).then_some(path)
}

pub(crate) fn block_at<'a>(blocks: &'a [Block], path: &[usize]) -> Option<&'a Block> {
    let (&first, rest) = path.split_first()?;
    let block = blocks.get(first)?;
    if rest.is_empty() {
        Some(block)
    } else {
        block_at(block.children()?, rest)
    }
}

pub(crate) fn block_at_mut<'a>(
    blocks: &'a mut [Block],
    path: &[usize],
) -> Result<&'a mut Block, PathError> {
    let Some((&first, rest)) = path.split_first() else {
        return Err(PathError("Empty path".into()));
    };
    let len = blocks.len();
    let block = blocks
        .get_mut(first)
        .ok_or_else(|| PathError(format!("Path out of bounds: {first} >= {len}")))?;
    if rest.is_empty() {
        Ok(block)
    } else {
        match block.children_mut() {
            Some(children) => block_at_mut(children, rest),
            None => Err(PathError(format!("Non-container block at index {first}"))),
        }
    }
}

/// Sibling list addressed by a parent path (empty path is the top level).
pub(crate) fn children_at<'a>(
    blocks: &'a [Block],
    parent_path: &[usize],
) -> Result<&'a [Block], PathError> {
    if parent_path.is_empty() {
        Ok(blocks)
    } else {
        block_at(blocks, parent_path)
            .and_then(Block::children)
            .ok_or_else(|| PathError("Parent is not a container".into()))
    }
}

fn children_at_mut<'a>(
    blocks: &'a mut Vec<Block>,
    parent_path: &[usize],
) -> Result<&'a mut Vec<Block>, PathError> {
    if parent_path.is_empty() {
        Ok(blocks)
    } else {
        block_at_mut(blocks, parent_path)?
            .children_mut()
            .ok_or_else(|| PathError("Parent is not a container".into()))
    }
}

fn insert_block(blocks: &mut Vec<Block>, path: &[usize], block: Block) -> Result<(), PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty insert path".into()));
    };
    let children = children_at_mut(blocks, parent_path)?;
    if index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(index, block);
    Ok(())
}

fn remove_block(blocks: &mut Vec<Block>, path: &[usize]) -> Result<Block, PathError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(PathError("Empty remove path".into()));
    };
    let children = children_at_mut(blocks, parent_path)?;
    if index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(index))
}

pub(crate) fn scope_for_path(blocks: &[Block], path: &[usize]) -> Scope {
    if path.len() < 2 {
        return Scope::Root;
    }
    let parent_path = &path[..path.len() - 1];
    match block_at(blocks, parent_path) {
        Some(parent) => match parent.block_type() {
            crate::block::BlockType::Toggle => Scope::Toggle(parent.id),
            crate::block::BlockType::Callout => Scope::Callout(parent.id),
            _ => Scope::Root,
        },
        None => Scope::Root,
    }
}

fn first_leaf(blocks: &[Block]) -> Option<&Block> {
    for block in blocks {
        if block.html().is_some() {
            return Some(block);
        }
        if let Some(found) = block.children().and_then(first_leaf) {
            return Some(found);
        }
    }
    None
}
