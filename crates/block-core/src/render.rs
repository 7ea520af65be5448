use std::collections::HashMap;

use tracing::error;

use crate::block::{Block, BlockId};
use crate::core::{CaretOffset, Editor};
use crate::decorate::BlockDecoration;
use crate::error::EditError;
use crate::ops::{Op, Transaction};

/// Display surface for the block tree.
///
/// The editor never reads live content on its own; whatever the user typed into
/// a node comes back through [`Renderer::content`] when the host calls
/// [`Editor::pull_content`].
pub trait Renderer {
    type Node;

    fn render(&mut self, block: &Block, decoration: &BlockDecoration) -> Self::Node;

    /// Current inline markup of a node's editable area, or `None` when it has
    /// none (callouts, images) or its structure is missing.
    fn content(&self, node: &Self::Node) -> Option<String>;

    fn focus(&mut self, node: &Self::Node, offset: CaretOffset);
}

impl Editor {
    /// Renders every block, containers before their children.
    pub fn render_all<R: Renderer>(&self, renderer: &mut R) -> HashMap<BlockId, R::Node> {
        fn walk<R: Renderer>(
            editor: &Editor,
            blocks: &[Block],
            renderer: &mut R,
            out: &mut HashMap<BlockId, R::Node>,
        ) {
            for block in blocks {
                let node = renderer.render(block, &editor.decoration(block.id));
                out.insert(block.id, node);
                if let Some(children) = block.children() {
                    walk(editor, children, renderer, out);
                }
            }
        }

        let mut out = HashMap::new();
        walk(self, self.blocks(), renderer, &mut out);
        out
    }

    /// Copies edited text from rendered nodes back into the tree as one undo
    /// step. Nodes whose block is gone are logged and skipped. Returns how many
    /// blocks changed.
    pub fn pull_content<R: Renderer>(
        &mut self,
        renderer: &R,
        nodes: &HashMap<BlockId, R::Node>,
    ) -> Result<usize, EditError> {
        let mut ops = Vec::new();
        for (&id, node) in nodes {
            let Some(path) = self.path_of(id) else {
                error!(id, "rendered node has no block");
                continue;
            };
            let Some(block) = self.block(id) else {
                continue;
            };
            if block.html().is_none() {
                continue;
            }
            let Some(html) = renderer.content(node) else {
                error!(id, "rendered node lost its editable area");
                continue;
            };
            if block.html() == Some(html.as_str()) {
                continue;
            }
            let mut updated = block.clone();
            if let Some(slot) = updated.html_mut() {
                *slot = html;
            }
            ops.push(Op::ReplaceBlock {
                path,
                block: updated,
            });
        }

        if ops.is_empty() {
            return Ok(0);
        }
        let changed = ops.len();
        let mut tx = Transaction::new(ops).source("pull_content");
        if let Some(caret) = self.caret() {
            tx = tx.caret_after(caret);
        }
        self.apply(tx)?;
        Ok(changed)
    }

    /// Moves rendered focus to the caret. Returns false when there is no caret
    /// or no node for its block.
    pub fn push_focus<R: Renderer>(
        &self,
        renderer: &mut R,
        nodes: &HashMap<BlockId, R::Node>,
    ) -> bool {
        let Some(caret) = self.caret() else {
            return false;
        };
        match nodes.get(&caret.block) {
            Some(node) => {
                renderer.focus(node, caret.offset);
                true
            }
            None => false,
        }
    }
}
