use tracing::warn;

use crate::block::{Block, BlockContent, IdAllocator, ListType};
use crate::core::EditorConfig;
use crate::decorate::{
    DecorationContext, DecorationPass, Decorations, ListNumbering, PlaceholderVisibility,
    QuoteAdjacency,
};
use crate::ops::{Op, Path};

/// Structural repair run after every transaction until it produces no ops.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, blocks: &[Block], config: &EditorConfig, ids: &mut IdAllocator) -> Vec<Op>;
}

#[derive(Default)]
pub struct PassRegistry {
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    decoration_passes: Vec<Box<dyn DecorationPass>>,
}

impl PassRegistry {
    pub fn new(
        normalize_passes: impl IntoIterator<Item = Box<dyn NormalizePass>>,
        decoration_passes: impl IntoIterator<Item = Box<dyn DecorationPass>>,
    ) -> Result<Self, String> {
        let mut registry = Self::default();
        for pass in normalize_passes {
            registry.register_normalize_pass(pass)?;
        }
        for pass in decoration_passes {
            registry.register_decoration_pass(pass)?;
        }
        Ok(registry)
    }

    pub fn standard() -> Self {
        Self {
            normalize_passes: vec![
                Box::new(EnsureNonEmptyDocument),
                Box::new(RepairNesting),
                Box::new(EnsureContainerChildren),
                Box::new(ClampIndentLevels),
            ],
            decoration_passes: vec![
                Box::new(ListNumbering),
                Box::new(QuoteAdjacency),
                Box::new(PlaceholderVisibility),
            ],
        }
    }

    pub fn register_normalize_pass(&mut self, pass: Box<dyn NormalizePass>) -> Result<(), String> {
        if self.normalize_passes.iter().any(|p| p.id() == pass.id()) {
            return Err(format!("Duplicate normalize pass id: {}", pass.id()));
        }
        self.normalize_passes.push(pass);
        Ok(())
    }

    pub fn register_decoration_pass(
        &mut self,
        pass: Box<dyn DecorationPass>,
    ) -> Result<(), String> {
        if self.decoration_passes.iter().any(|p| p.id() == pass.id()) {
            return Err(format!("Duplicate decoration pass id: {}", pass.id()));
        }
        self.decoration_passes.push(pass);
        Ok(())
    }

    pub fn normalize_pass_ids(&self) -> Vec<&'static str> {
        self.normalize_passes.iter().map(|p| p.id()).collect()
    }

    pub fn decoration_pass_ids(&self) -> Vec<&'static str> {
        self.decoration_passes.iter().map(|p| p.id()).collect()
    }

    /// Ops of the first pass that wants a change. Paths from different passes
    /// would not compose, so the caller re-runs until nothing is returned.
    pub fn normalize(&self, blocks: &[Block], config: &EditorConfig, ids: &mut IdAllocator) -> Vec<Op> {
        for pass in &self.normalize_passes {
            let ops = pass.run(blocks, config, ids);
            if !ops.is_empty() {
                return ops;
            }
        }
        Vec::new()
    }

    /// Runs every decoration pass on every sibling list, top level first.
    /// Containers get fresh state; nothing carries over from the parent list.
    pub fn decorate(&self, blocks: &[Block], ctx: &DecorationContext) -> Decorations {
        fn walk(
            registry: &PassRegistry,
            siblings: &[Block],
            ctx: &DecorationContext,
            out: &mut Decorations,
        ) {
            registry.decorate_scope(siblings, ctx, out);
            for block in siblings {
                if let Some(children) = block.children() {
                    walk(registry, children, ctx, out);
                }
            }
        }

        let mut out = Decorations::default();
        walk(self, blocks, ctx, &mut out);
        out
    }

    pub fn decorate_scope(&self, siblings: &[Block], ctx: &DecorationContext, out: &mut Decorations) {
        for pass in &self.decoration_passes {
            pass.run(siblings, ctx, out);
        }
    }
}

/// Largest indent level a block may hold given its variant.
pub fn indent_limit(block: &Block, config: &EditorConfig) -> u8 {
    match &block.content {
        BlockContent::Paragraph { .. } | BlockContent::Todo { .. } => config.max_indent,
        BlockContent::ListItem {
            list_type: ListType::Ordered,
            ..
        } => config.max_ordered_list_indent,
        BlockContent::ListItem {
            list_type: ListType::Unordered,
            ..
        } => config.max_unordered_list_indent,
        _ => 0,
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, blocks: &[Block], _config: &EditorConfig, ids: &mut IdAllocator) -> Vec<Op> {
        if !blocks.is_empty() {
            return Vec::new();
        }
        vec![Op::InsertBlock {
            path: vec![0],
            block: Block::paragraph(ids.next_id(), ""),
        }]
    }
}

/// Callouts and toggles never stay empty.
struct EnsureContainerChildren;

impl NormalizePass for EnsureContainerChildren {
    fn id(&self) -> &'static str {
        "container.ensure_children"
    }

    fn run(&self, blocks: &[Block], _config: &EditorConfig, ids: &mut IdAllocator) -> Vec<Op> {
        fn walk(siblings: &[Block], path: &mut Path, ids: &mut IdAllocator, ops: &mut Vec<Op>) {
            for (ix, block) in siblings.iter().enumerate() {
                let Some(children) = block.children() else {
                    continue;
                };
                path.push(ix);
                if children.is_empty() {
                    let mut insert_path = path.clone();
                    insert_path.push(0);
                    ops.push(Op::InsertBlock {
                        path: insert_path,
                        block: Block::paragraph(ids.next_id(), ""),
                    });
                } else {
                    walk(children, path, ids, ops);
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(blocks, &mut Vec::new(), ids, &mut ops);
        ops
    }
}

struct ClampIndentLevels;

impl NormalizePass for ClampIndentLevels {
    fn id(&self) -> &'static str {
        "block.clamp_indent_levels"
    }

    fn run(&self, blocks: &[Block], config: &EditorConfig, _ids: &mut IdAllocator) -> Vec<Op> {
        fn walk(siblings: &[Block], path: &mut Path, config: &EditorConfig, ops: &mut Vec<Op>) {
            for (ix, block) in siblings.iter().enumerate() {
                path.push(ix);
                let limit = indent_limit(block, config);
                if block.indent_level() > limit {
                    let mut clamped = block.clone();
                    clamped.set_indent_level(limit);
                    ops.push(Op::ReplaceBlock {
                        path: path.clone(),
                        block: clamped,
                    });
                }
                if let Some(children) = block.children() {
                    walk(children, path, config, ops);
                }
                path.pop();
            }
        }

        let mut ops = Vec::new();
        walk(blocks, &mut Vec::new(), config, &mut ops);
        ops
    }
}

/// Fixes nesting that the edit commands refuse to create but stored data may
/// still contain. Repairs one violation per run.
struct RepairNesting;

impl NormalizePass for RepairNesting {
    fn id(&self) -> &'static str {
        "container.repair_nesting"
    }

    fn run(&self, blocks: &[Block], _config: &EditorConfig, _ids: &mut IdAllocator) -> Vec<Op> {
        fn walk(siblings: &[Block], path: &mut Path, parent: Option<&Block>) -> Option<Vec<Op>> {
            for (ix, block) in siblings.iter().enumerate() {
                path.push(ix);
                let in_toggle = matches!(
                    parent.map(|p| &p.content),
                    Some(BlockContent::Toggle { .. })
                );
                let in_container = parent.is_some();

                if let (
                    true,
                    BlockContent::Toggle {
                        title_html,
                        children,
                        ..
                    },
                ) = (in_toggle, &block.content)
                {
                    warn!(id = block.id, "unnesting toggle found inside a toggle");
                    let mut ops = vec![Op::ReplaceBlock {
                        path: path.clone(),
                        block: Block::paragraph(block.id, title_html.clone()),
                    }];
                    let (&last, parent_path) = path.split_last()?;
                    for (offset, child) in children.iter().enumerate() {
                        let mut insert_path = parent_path.to_vec();
                        insert_path.push(last + 1 + offset);
                        ops.push(Op::InsertBlock {
                            path: insert_path,
                            block: child.clone(),
                        });
                    }
                    return Some(ops);
                }

                if in_container && matches!(block.content, BlockContent::Image { .. }) {
                    warn!(id = block.id, "dropping image found inside a container");
                    return Some(vec![Op::RemoveBlock { path: path.clone() }]);
                }

                if let Some(children) = block.children() {
                    if let Some(ops) = walk(children, path, Some(block)) {
                        return Some(ops);
                    }
                }
                path.pop();
            }
            None
        }

        walk(blocks, &mut Vec::new(), None).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_pass_order() {
        let registry = PassRegistry::standard();
        assert_eq!(
            registry.decoration_pass_ids(),
            vec!["list.numbering", "quote.adjacency", "placeholder.visibility"]
        );
        assert_eq!(registry.normalize_pass_ids().len(), 4);
    }

    #[test]
    fn duplicate_pass_ids_are_rejected() {
        let mut registry = PassRegistry::standard();
        assert!(
            registry
                .register_decoration_pass(Box::new(ListNumbering))
                .is_err()
        );
    }

    #[test]
    fn indent_limits_follow_variant() {
        let config = EditorConfig::default();
        assert_eq!(indent_limit(&Block::paragraph(1, ""), &config), 8);
        assert_eq!(
            indent_limit(&Block::list_item(2, ListType::Ordered, 0, ""), &config),
            2
        );
        assert_eq!(indent_limit(&Block::quote(3, ""), &config), 0);
    }
}
