//! Relocating sibling blocks: drag and drop and the keyboard move shortcuts.

use tracing::debug;

use crate::block::{Block, BlockContent, BlockId, BlockType};
use crate::core::{Editor, apply_op_to, block_at, children_at, find_path};
use crate::error::{ApplyError, EditError, NestingViolation};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::indent_limit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropParent {
    Root,
    Container(BlockId),
}

/// Where moved blocks land: in `parent`'s children, in front of `before` (or at
/// the end), with the first moved block at `indent_level` when given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    pub parent: DropParent,
    pub before: Option<BlockId>,
    pub indent_level: Option<u8>,
}

impl DropTarget {
    pub fn root(before: Option<BlockId>) -> Self {
        Self {
            parent: DropParent::Root,
            before,
            indent_level: None,
        }
    }

    pub fn container(id: BlockId, before: Option<BlockId>) -> Self {
        Self {
            parent: DropParent::Container(id),
            before,
            indent_level: None,
        }
    }

    pub fn with_indent(mut self, level: u8) -> Self {
        self.indent_level = Some(level);
        self
    }
}

/// Measured layout of one rendered block, in the drop surface's coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRect {
    pub id: BlockId,
    pub top: f32,
    pub height: f32,
    /// Left edge of the block's content, after its indentation.
    pub left: f32,
    pub indent_level: u8,
}

/// Horizontal bands that turn pointer x into an indent level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndentBands {
    pub step: f32,
}

impl Default for IndentBands {
    fn default() -> Self {
        Self { step: 24.0 }
    }
}

/// Picks the insertion point for a drag hovering at `(x, y)` over one sibling
/// list.
///
/// `rects` are the siblings in visual order, without the blocks being dragged.
/// The nearest block wins; the upper half of it drops in front, the lower half
/// behind. The indent follows how far right of the block above the pointer is,
/// never deeper than one level below it.
pub fn resolve_drop(
    parent: DropParent,
    rects: &[BlockRect],
    x: f32,
    y: f32,
    bands: IndentBands,
) -> DropTarget {
    let distance = |rect: &BlockRect| {
        if y < rect.top {
            rect.top - y
        } else if y > rect.top + rect.height {
            y - (rect.top + rect.height)
        } else {
            0.0
        }
    };

    let nearest = rects
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance(a).total_cmp(&distance(b)))
        .map(|(ix, _)| ix);

    let Some(ix) = nearest else {
        return DropTarget {
            parent,
            before: None,
            indent_level: Some(0),
        };
    };

    let rect = &rects[ix];
    let (above, before) = if y < rect.top + rect.height / 2.0 {
        (ix.checked_sub(1).map(|prev| &rects[prev]), Some(rect.id))
    } else {
        (Some(rect), rects.get(ix + 1).map(|next| next.id))
    };

    let indent_level = match above {
        Some(above) if bands.step > 0.0 => {
            let steps = ((x - above.left) / bands.step).floor() as i32;
            let level = (above.indent_level as i32 + steps).clamp(0, above.indent_level as i32 + 1);
            level as u8
        }
        _ => 0,
    };

    DropTarget {
        parent,
        before,
        indent_level: Some(indent_level),
    }
}

impl Editor {
    /// Moves a run of sibling blocks to `target` as one undo step.
    ///
    /// Blocks keep their document order. A paragraph landing next to a list item
    /// or todo joins that list; a bulleted or numbered item landing away from any
    /// list becomes a paragraph. Returns false when the move changes nothing.
    pub fn move_blocks(&mut self, ids: &[BlockId], target: DropTarget) -> Result<bool, EditError> {
        let Some(&first_id) = ids.first() else {
            return Ok(false);
        };

        let mut paths: Vec<Path> = Vec::with_capacity(ids.len());
        for &id in ids {
            let path = self.path_of(id).ok_or(EditError::BlockNotFound(id))?;
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        let source_parent = paths[0][..paths[0].len() - 1].to_vec();
        if paths
            .iter()
            .any(|path| path[..path.len() - 1] != source_parent[..])
        {
            return Err(EditError::InvalidMove(
                "moved blocks must share one parent".into(),
            ));
        }

        let moved: Vec<Block> = paths
            .iter()
            .filter_map(|path| block_at(self.blocks(), path).cloned())
            .collect();

        if let DropParent::Container(container_id) = target.parent {
            let inside_moved = moved.iter().any(|block| {
                block.id == container_id
                    || find_path(block.children().unwrap_or_default(), container_id).is_some()
            });
            if inside_moved {
                return self.refuse_move(first_id, NestingViolation::ContainerIntoItself);
            }
            let container = self
                .block(container_id)
                .ok_or(EditError::BlockNotFound(container_id))?;
            match container.block_type() {
                BlockType::Toggle => {
                    if moved.iter().any(|b| b.block_type() == BlockType::Toggle) {
                        return self.refuse_move(first_id, NestingViolation::ToggleInToggle);
                    }
                }
                BlockType::Callout => {}
                _ => {
                    return Err(EditError::InvalidMove(format!(
                        "block {container_id} cannot hold children"
                    )));
                }
            }
            if moved.iter().any(|b| b.block_type() == BlockType::Image) {
                return self.refuse_move(first_id, NestingViolation::ImageInContainer);
            }
        }

        if target.before.is_some_and(|before| moved.iter().any(|b| b.id == before)) {
            return Ok(false);
        }

        // Work out destination paths on a scratch tree with the blocks taken out.
        let mut scratch = self.blocks().to_vec();
        let mut ops: Vec<Op> = Vec::new();
        for path in paths.iter().rev() {
            apply_op_to(&mut scratch, Op::RemoveBlock { path: path.clone() })?;
            ops.push(Op::RemoveBlock { path: path.clone() });
        }

        let dest_parent: Path = match target.parent {
            DropParent::Root => Vec::new(),
            DropParent::Container(id) => {
                find_path(&scratch, id).ok_or(EditError::BlockNotFound(id))?
            }
        };
        let dest = children_at(&scratch, &dest_parent).map_err(ApplyError::from)?;
        let insert_at = match target.before {
            Some(before) => dest.iter().position(|b| b.id == before).ok_or_else(|| {
                EditError::InvalidMove(format!("block {before} is not in the drop list"))
            })?,
            None => dest.len(),
        };

        let above = insert_at.checked_sub(1).and_then(|ix| dest.get(ix));
        let below = dest.get(insert_at);
        let list_context = above
            .filter(|b| b.is_list_like())
            .or(below.filter(|b| b.is_list_like()))
            .cloned();
        let ceiling = above
            .filter(|b| !b.is_container())
            .map(|b| b.indent_level() + 1)
            .unwrap_or(0);

        let base = moved.first().map(Block::indent_level).unwrap_or_default();
        let first_level = target.indent_level.unwrap_or(base).min(ceiling);
        let config = self.config().clone();
        for (offset, block) in moved.into_iter().enumerate() {
            let mut block = reformat_for_list(block, list_context.as_ref());
            let wanted = block.indent_level() as i32 - base as i32 + first_level as i32;
            block.set_indent_level(wanted.max(0) as u8);
            let limit = indent_limit(&block, &config);
            if block.indent_level() > limit {
                block.set_indent_level(limit);
            }

            let mut path = dest_parent.clone();
            path.push(insert_at + offset);
            apply_op_to(
                &mut scratch,
                Op::InsertBlock {
                    path: path.clone(),
                    block: block.clone(),
                },
            )?;
            ops.push(Op::InsertBlock { path, block });
        }

        if scratch == self.blocks() {
            return Ok(false);
        }

        debug!(count = paths.len(), ?target, "moving blocks");
        let mut tx = Transaction::new(ops).source("move");
        if let Some(caret) = self.caret() {
            tx = tx.caret_after(caret);
        }
        self.apply(tx)?;
        Ok(true)
    }

    fn refuse_move(&mut self, id: BlockId, reason: NestingViolation) -> Result<bool, EditError> {
        debug!(id, %reason, "move refused");
        self.flash(id);
        Err(EditError::IllegalNesting { id, reason })
    }

    /// Swaps a block with its previous sibling.
    pub fn move_up(&mut self, id: BlockId) -> Result<bool, EditError> {
        let Some((parent, siblings, index)) = self.sibling_context(id)? else {
            return Ok(false);
        };
        let Some(prev) = index.checked_sub(1).map(|ix| siblings[ix]) else {
            return Ok(false);
        };
        self.move_blocks(&[id], DropTarget {
            parent,
            before: Some(prev),
            indent_level: None,
        })
    }

    /// Swaps a block with its next sibling.
    pub fn move_down(&mut self, id: BlockId) -> Result<bool, EditError> {
        let Some((parent, siblings, index)) = self.sibling_context(id)? else {
            return Ok(false);
        };
        if index + 1 >= siblings.len() {
            return Ok(false);
        }
        self.move_blocks(&[id], DropTarget {
            parent,
            before: siblings.get(index + 2).copied(),
            indent_level: None,
        })
    }

    fn sibling_context(
        &self,
        id: BlockId,
    ) -> Result<Option<(DropParent, Vec<BlockId>, usize)>, EditError> {
        let path = self.path_of(id).ok_or(EditError::BlockNotFound(id))?;
        let Some((&index, parent_path)) = path.split_last() else {
            return Ok(None);
        };
        let parent = match block_at(self.blocks(), parent_path) {
            Some(container) => DropParent::Container(container.id),
            None => DropParent::Root,
        };
        let siblings = children_at(self.blocks(), parent_path)
            .map_err(ApplyError::from)?
            .iter()
            .map(|b| b.id)
            .collect();
        Ok(Some((parent, siblings, index)))
    }
}

/// Adjusts a moved block to the list it lands in.
fn reformat_for_list(mut block: Block, list_context: Option<&Block>) -> Block {
    let reformatted = match (list_context, &block.content) {
        (
            Some(neighbor),
            BlockContent::Paragraph {
                html,
                indent_level,
                in_quote: false,
            },
        ) => Some(match &neighbor.content {
            BlockContent::ListItem { list_type, .. } => BlockContent::ListItem {
                list_type: *list_type,
                html: html.clone(),
                indent_level: *indent_level,
            },
            _ => BlockContent::Todo {
                html: html.clone(),
                checked: false,
                indent_level: *indent_level,
            },
        }),
        (
            None,
            BlockContent::ListItem {
                html, indent_level, ..
            },
        ) => Some(BlockContent::Paragraph {
            html: html.clone(),
            indent_level: *indent_level,
            in_quote: false,
        }),
        _ => None,
    };
    if let Some(content) = reformatted {
        block.content = content;
    }
    block
}
