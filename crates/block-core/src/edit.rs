use tracing::debug;

use crate::block::{Block, BlockContent, BlockId, BlockType};
use crate::core::{Caret, Editor, Scope, block_at, children_at, scope_for_path};
use crate::error::{ApplyError, EditError, NestingViolation};
use crate::inline;
use crate::ops::{Op, Path, Transaction};
use crate::plugin::indent_limit;
use crate::transform::{TypeOptions, check_nesting, transition};

/// A block together with where it sits.
pub(crate) struct Located {
    pub path: Path,
    pub scope: Scope,
    pub block: Block,
}

/// Path of the slot right after `path` in the same sibling list.
pub(crate) fn next_sibling(path: &[usize]) -> Path {
    let mut next = path.to_vec();
    if let Some(last) = next.last_mut() {
        *last += 1;
    }
    next
}

fn parent_of(path: &[usize]) -> &[usize] {
    path.split_last().map(|(_, parent)| parent).unwrap_or_default()
}

/// What a block turns into when Enter splits it: lists and todos continue,
/// headings fall back to body text.
fn split_successor(content: &BlockContent, html: String) -> BlockContent {
    match content {
        BlockContent::Paragraph {
            indent_level,
            in_quote,
            ..
        } => BlockContent::Paragraph {
            html,
            indent_level: *indent_level,
            in_quote: *in_quote,
        },
        BlockContent::ListItem {
            list_type,
            indent_level,
            ..
        } => BlockContent::ListItem {
            list_type: *list_type,
            html,
            indent_level: *indent_level,
        },
        BlockContent::Todo { indent_level, .. } => BlockContent::Todo {
            html,
            checked: false,
            indent_level: *indent_level,
        },
        BlockContent::Quote { .. } => BlockContent::Quote { html },
        _ => BlockContent::Paragraph {
            html,
            indent_level: 0,
            in_quote: false,
        },
    }
}

impl Editor {
    pub(crate) fn locate(&self, id: BlockId) -> Result<Located, EditError> {
        let path = self.path_of(id).ok_or(EditError::BlockNotFound(id))?;
        let block = block_at(self.blocks(), &path)
            .cloned()
            .ok_or(EditError::BlockNotFound(id))?;
        Ok(Located {
            scope: scope_for_path(self.blocks(), &path),
            path,
            block,
        })
    }

    fn sibling_at(&self, path: &[usize], index: usize) -> Option<&Block> {
        children_at(self.blocks(), parent_of(path))
            .ok()
            .and_then(|siblings| siblings.get(index))
    }

    /// Moves a block one indent level in the direction of `delta`'s sign.
    ///
    /// Indenting needs a non-container previous sibling and may go at most one
    /// level deeper than it. Outdenting a list item at level 0 turns it into a
    /// paragraph; any other block at level 0 is left alone.
    pub fn indent(&mut self, id: BlockId, delta: i32) -> Result<(), EditError> {
        let Located { path, block, .. } = self.locate(id)?;
        let current = block.indent_level();

        match delta.signum() {
            0 => Ok(()),
            1 => {
                let limit = indent_limit(&block, self.config());
                let index = path.last().copied().unwrap_or_default();
                let prev = index
                    .checked_sub(1)
                    .and_then(|ix| self.sibling_at(&path, ix));
                let allowed = current < limit
                    && prev.is_some_and(|prev| {
                        !prev.is_container() && current <= prev.indent_level()
                    });
                if !allowed {
                    debug!(id, current, limit, "indent refused");
                    self.flash(id);
                    return Err(EditError::IndentRefused { id });
                }
                self.replace_indent(path, block, current + 1, "indent")
            }
            _ if current > 0 => self.replace_indent(path, block, current - 1, "outdent"),
            _ => {
                if matches!(block.content, BlockContent::ListItem { .. }) {
                    self.change_type(
                        id,
                        BlockType::Paragraph,
                        None,
                        TypeOptions {
                            indent_level: Some(0),
                            ..TypeOptions::default()
                        },
                    )?;
                }
                Ok(())
            }
        }
    }

    fn replace_indent(
        &mut self,
        path: Path,
        mut block: Block,
        level: u8,
        source: &str,
    ) -> Result<(), EditError> {
        let id = block.id;
        block.set_indent_level(level);
        let caret = self
            .caret()
            .filter(|caret| caret.block == id)
            .unwrap_or(Caret::end(id));
        let tx = Transaction::new(vec![Op::ReplaceBlock { path, block }])
            .caret_after(caret)
            .source(source);
        self.apply(tx)?;
        Ok(())
    }

    /// Enter at `offset` visible characters into the block. Returns the block
    /// that receives focus when a new one was created or an existing child was
    /// entered, `None` when the key only reformatted the block in place.
    pub fn split_at_cursor(
        &mut self,
        id: BlockId,
        offset: usize,
    ) -> Result<Option<BlockId>, EditError> {
        let Located { path, scope, block } = self.locate(id)?;
        if !block.is_container() && block.html().is_some() {
            return self.split_leaf(path, scope, block, offset);
        }

        match &block.content {
            BlockContent::Toggle { children, .. } => {
                let reuse = children
                    .first()
                    .filter(|child| {
                        matches!(child.content, BlockContent::Paragraph { .. }) && child.is_blank()
                    })
                    .map(|child| child.id);

                let mut opened = block.clone();
                if let BlockContent::Toggle { is_open, .. } = &mut opened.content {
                    *is_open = true;
                }
                let mut ops = vec![Op::ReplaceBlock {
                    path: path.clone(),
                    block: opened,
                }];
                let target = match reuse {
                    Some(child) => child,
                    None => {
                        let child = Block::paragraph(self.ids_mut().next_id(), "");
                        let child_id = child.id;
                        let mut child_path = path.clone();
                        child_path.push(0);
                        ops.push(Op::InsertBlock {
                            path: child_path,
                            block: child,
                        });
                        child_id
                    }
                };
                let tx = Transaction::new(ops)
                    .caret_after(Caret::start(target))
                    .source("split:toggle");
                self.apply(tx)?;
                Ok(Some(target))
            }
            BlockContent::Callout { children } => {
                let first = children.first().map(|child| child.id);
                if let Some(first) = first {
                    self.set_caret(Some(Caret::start(first)));
                }
                Ok(first)
            }
            BlockContent::Image { .. } => {
                let next = Block::paragraph(self.ids_mut().next_id(), "");
                let next_id = next.id;
                let tx = Transaction::new(vec![Op::InsertBlock {
                    path: next_sibling(&path),
                    block: next,
                }])
                .caret_after(Caret::start(next_id))
                .source("split:image");
                self.apply(tx)?;
                Ok(Some(next_id))
            }
            _ => Ok(None),
        }
    }

    fn split_leaf(
        &mut self,
        path: Path,
        scope: Scope,
        block: Block,
        offset: usize,
    ) -> Result<Option<BlockId>, EditError> {
        let id = block.id;
        let html = block.html().unwrap_or_default().to_string();
        let blank = inline::is_blank(&html);

        if blank && block.is_list_like() {
            if block.indent_level() > 0 {
                self.indent(id, -1)?;
            } else {
                self.change_type(
                    id,
                    BlockType::Paragraph,
                    None,
                    TypeOptions {
                        indent_level: Some(0),
                        ..TypeOptions::default()
                    },
                )?;
            }
            return Ok(None);
        }

        if blank && block.is_quote() {
            self.change_type(
                id,
                BlockType::Paragraph,
                None,
                TypeOptions {
                    in_quote: Some(false),
                    ..TypeOptions::default()
                },
            )?;
            return Ok(None);
        }

        if blank
            && scope.is_container()
            && matches!(
                block.content,
                BlockContent::Paragraph {
                    indent_level: 0,
                    ..
                }
            )
        {
            return self.exit_container(path).map(Some);
        }

        let (before, after) = inline::split_at(&html, offset);
        let mut head = block.clone();
        if let Some(slot) = head.html_mut() {
            *slot = before;
        }
        let tail = Block::new(
            self.ids_mut().next_id(),
            split_successor(&block.content, after),
        );
        let tail_id = tail.id;

        let tx = Transaction::new(vec![
            Op::ReplaceBlock {
                path: path.clone(),
                block: head,
            },
            Op::InsertBlock {
                path: next_sibling(&path),
                block: tail,
            },
        ])
        .caret_after(Caret::start(tail_id))
        .source("split");
        self.apply(tx)?;
        Ok(Some(tail_id))
    }

    /// Leaves a container from an empty trailing paragraph: the paragraph goes
    /// away (unless it is the only child) and a new one opens after the container.
    fn exit_container(&mut self, path: Path) -> Result<BlockId, EditError> {
        let parent_path = parent_of(&path).to_vec();
        let index = path.last().copied().unwrap_or_default();
        let sibling_count = children_at(self.blocks(), &parent_path)
            .map_err(ApplyError::from)?
            .len();

        let mut ops = Vec::new();
        if index + 1 == sibling_count && sibling_count > 1 {
            ops.push(Op::RemoveBlock { path });
        }
        let next = Block::paragraph(self.ids_mut().next_id(), "");
        let next_id = next.id;
        ops.push(Op::InsertBlock {
            path: next_sibling(&parent_path),
            block: next,
        });

        let tx = Transaction::new(ops)
            .caret_after(Caret::start(next_id))
            .source("split:exit_container");
        self.apply(tx)?;
        Ok(next_id)
    }

    /// Backspace at the start of a block.
    pub fn merge_with_previous(&mut self, id: BlockId) -> Result<(), EditError> {
        let Located { path, scope, block } = self.locate(id)?;

        match block.block_type() {
            BlockType::Toggle | BlockType::Callout => {
                return self.unwrap_container(path, scope, block);
            }
            BlockType::Image => return self.delete_block(id),
            _ => {}
        }

        let html = block.html().unwrap_or_default().to_string();
        if block.indent_level() > 0 && inline::is_blank(&html) {
            return self.indent(id, -1);
        }

        let index = path.last().copied().unwrap_or_default();
        if index > 0 {
            let mut prev_path = path.clone();
            if let Some(last) = prev_path.last_mut() {
                *last = index - 1;
            }
            let prev = block_at(self.blocks(), &prev_path)
                .cloned()
                .ok_or(EditError::BlockNotFound(id))?;
            return self.merge_into(prev_path, prev, path, html);
        }

        match scope {
            Scope::Root => Ok(()),
            Scope::Toggle(_) => self.merge_into_toggle_title(path, html),
            Scope::Callout(_) => self.leave_callout(path, block, html),
        }
    }

    fn merge_into(
        &mut self,
        prev_path: Path,
        prev: Block,
        path: Path,
        html: String,
    ) -> Result<(), EditError> {
        let mut ops = Vec::new();
        let caret = match &prev.content {
            BlockContent::Image { .. } => {
                if !inline::is_blank(&html) {
                    return Ok(());
                }
                ops.push(Op::RemoveBlock { path });
                Caret::end(prev.id)
            }
            BlockContent::Callout { children } => {
                let Some(first) = children.first() else {
                    return Ok(());
                };
                let Some(first_html) = first.html() else {
                    return Ok(());
                };
                let caret = Caret::at(first.id, inline::text_len(first_html));
                let mut merged = first.clone();
                if let Some(slot) = merged.html_mut() {
                    *slot = inline::concat(first_html, &html);
                }
                let mut first_path = prev_path;
                first_path.push(0);
                ops.push(Op::ReplaceBlock {
                    path: first_path,
                    block: merged,
                });
                ops.push(Op::RemoveBlock { path });
                caret
            }
            _ => {
                let Some(prev_html) = prev.html() else {
                    return Ok(());
                };
                let caret = Caret::at(prev.id, inline::text_len(prev_html));
                let mut merged = prev.clone();
                if let Some(slot) = merged.html_mut() {
                    *slot = inline::concat(prev_html, &html);
                }
                ops.push(Op::ReplaceBlock {
                    path: prev_path,
                    block: merged,
                });
                ops.push(Op::RemoveBlock { path });
                caret
            }
        };

        let tx = Transaction::new(ops).caret_after(caret).source("merge");
        self.apply(tx)?;
        Ok(())
    }

    /// First child of a toggle: an empty sole child dissolves the toggle into a
    /// paragraph holding the title, anything else joins the title.
    fn merge_into_toggle_title(&mut self, path: Path, html: String) -> Result<(), EditError> {
        let parent_path = parent_of(&path).to_vec();
        let Some(toggle) = block_at(self.blocks(), &parent_path).cloned() else {
            return Ok(());
        };
        let BlockContent::Toggle {
            title_html,
            is_open,
            children,
        } = toggle.content
        else {
            return Ok(());
        };

        let caret = Caret::at(toggle.id, inline::text_len(&title_html));
        let replacement = if children.len() == 1 && inline::is_blank(&html) {
            Block::paragraph(toggle.id, title_html)
        } else {
            Block::new(
                toggle.id,
                BlockContent::Toggle {
                    title_html: inline::concat(&title_html, &html),
                    is_open,
                    children: children.into_iter().skip(1).collect(),
                },
            )
        };

        let tx = Transaction::new(vec![Op::ReplaceBlock {
            path: parent_path,
            block: replacement,
        }])
        .caret_after(caret)
        .source("merge:toggle_title");
        self.apply(tx)?;
        Ok(())
    }

    /// First child of a callout: a sole child dissolves the callout into a
    /// paragraph with its text, otherwise the block moves out in front of it.
    fn leave_callout(&mut self, path: Path, block: Block, html: String) -> Result<(), EditError> {
        let parent_path = parent_of(&path).to_vec();
        let Some(callout) = block_at(self.blocks(), &parent_path).cloned() else {
            return Ok(());
        };
        let sole = callout.children().is_some_and(|children| children.len() == 1);

        let (ops, caret) = if sole {
            (
                vec![Op::ReplaceBlock {
                    path: parent_path,
                    block: Block::paragraph(callout.id, html),
                }],
                Caret::start(callout.id),
            )
        } else {
            let caret = Caret::start(block.id);
            (
                vec![
                    Op::RemoveBlock { path },
                    Op::InsertBlock {
                        path: parent_path,
                        block,
                    },
                ],
                caret,
            )
        };

        let tx = Transaction::new(ops)
            .caret_after(caret)
            .source("merge:leave_callout");
        self.apply(tx)?;
        Ok(())
    }

    /// Backspace at the start of a container: a toggle becomes a paragraph with
    /// its title, a callout disappears; children move up into the enclosing list.
    fn unwrap_container(&mut self, path: Path, scope: Scope, block: Block) -> Result<(), EditError> {
        let id = block.id;
        let children = block.children().map(<[Block]>::to_vec).unwrap_or_default();
        if matches!(scope, Scope::Toggle(_))
            && children
                .iter()
                .any(|child| child.block_type() == BlockType::Toggle)
        {
            self.flash(id);
            return Err(EditError::IllegalNesting {
                id,
                reason: NestingViolation::ToggleInToggle,
            });
        }

        let (mut ops, first_child_at, caret) = match &block.content {
            BlockContent::Toggle { title_html, .. } => (
                vec![Op::ReplaceBlock {
                    path: path.clone(),
                    block: Block::paragraph(id, title_html.clone()),
                }],
                next_sibling(&path),
                Caret::start(id),
            ),
            _ => {
                let caret = children
                    .first()
                    .map(|child| Caret::start(child.id))
                    .unwrap_or(Caret::start(id));
                (
                    vec![Op::RemoveBlock { path: path.clone() }],
                    path.clone(),
                    caret,
                )
            }
        };

        let (&start, parent_path) = first_child_at
            .split_last()
            .ok_or(EditError::BlockNotFound(id))?;
        for (offset, child) in children.into_iter().enumerate() {
            let mut insert_path = parent_path.to_vec();
            insert_path.push(start + offset);
            ops.push(Op::InsertBlock {
                path: insert_path,
                block: child,
            });
        }

        let tx = Transaction::new(ops)
            .caret_after(caret)
            .source("merge:unwrap_container");
        self.apply(tx)?;
        Ok(())
    }

    /// Removes a block and its children. Focus goes to the previous sibling, or
    /// the next one when there is none.
    pub fn delete_block(&mut self, id: BlockId) -> Result<(), EditError> {
        let Located { path, .. } = self.locate(id)?;
        let index = path.last().copied().unwrap_or_default();
        let caret = index
            .checked_sub(1)
            .and_then(|ix| self.sibling_at(&path, ix))
            .map(|prev| Caret::end(prev.id))
            .or_else(|| self.sibling_at(&path, index + 1).map(|next| Caret::start(next.id)));

        let mut tx = Transaction::new(vec![Op::RemoveBlock { path }]).source("delete");
        if let Some(caret) = caret {
            tx = tx.caret_after(caret);
        }
        self.apply(tx)?;
        Ok(())
    }

    /// Inserts a fresh block of `block_type` right after `id`, in the same list.
    pub fn insert_after(&mut self, id: BlockId, block_type: BlockType) -> Result<BlockId, EditError> {
        let Located { path, scope, .. } = self.locate(id)?;
        let config = self.config().clone();
        let new_id = self.ids_mut().next_id();
        let seed = Block::paragraph(new_id, "");
        if let Err(reason) = check_nesting(&seed, scope, block_type, &TypeOptions::default()) {
            self.flash(id);
            return Err(EditError::IllegalNesting { id, reason });
        }
        let block = transition(
            &seed,
            block_type,
            None,
            &TypeOptions::default(),
            &config,
            self.ids_mut(),
        );

        let tx = Transaction::new(vec![Op::InsertBlock {
            path: next_sibling(&path),
            block,
        }])
        .caret_after(Caret::start(new_id))
        .source("insert");
        self.apply(tx)?;
        Ok(new_id)
    }

    /// Writes new inline content into a leaf or a toggle title. Returns false
    /// when nothing changed.
    pub fn set_html(&mut self, id: BlockId, html: impl Into<String>) -> Result<bool, EditError> {
        let html = html.into();
        let Located {
            path, mut block, ..
        } = self.locate(id)?;
        match block.html_mut() {
            Some(slot) if *slot != html => *slot = html,
            _ => return Ok(false),
        }
        self.replace(path, block, "set_html")
    }

    pub fn set_checked(&mut self, id: BlockId, checked: bool) -> Result<bool, EditError> {
        let Located {
            path, mut block, ..
        } = self.locate(id)?;
        match &mut block.content {
            BlockContent::Todo { checked: slot, .. } if *slot != checked => *slot = checked,
            _ => return Ok(false),
        }
        self.replace(path, block, "set_checked")
    }

    pub fn set_open(&mut self, id: BlockId, open: bool) -> Result<bool, EditError> {
        let Located {
            path, mut block, ..
        } = self.locate(id)?;
        match &mut block.content {
            BlockContent::Toggle { is_open, .. } if *is_open != open => *is_open = open,
            _ => return Ok(false),
        }
        self.replace(path, block, "set_open")
    }

    pub fn toggle_open(&mut self, id: BlockId) -> Result<bool, EditError> {
        let open = matches!(
            self.block(id).map(|block| &block.content),
            Some(BlockContent::Toggle { is_open: true, .. })
        );
        self.set_open(id, !open)
    }

    pub fn set_image_src(&mut self, id: BlockId, src: Option<String>) -> Result<bool, EditError> {
        let Located {
            path, mut block, ..
        } = self.locate(id)?;
        match &mut block.content {
            BlockContent::Image { src: slot } if *slot != src => *slot = src,
            _ => return Ok(false),
        }
        self.replace(path, block, "set_image_src")
    }

    fn replace(&mut self, path: Path, block: Block, source: &str) -> Result<bool, EditError> {
        let mut tx = Transaction::new(vec![Op::ReplaceBlock { path, block }]).source(source);
        if let Some(caret) = self.caret() {
            tx = tx.caret_after(caret);
        }
        self.apply(tx)?;
        Ok(true)
    }
}
