use tracing::debug;

use crate::block::{Block, BlockContent, BlockId, BlockType, HeadingLevel, IdAllocator, ListType};
use crate::core::{Caret, Editor, EditorConfig, Scope, block_at, scope_for_path};
use crate::error::{EditError, NestingViolation};
use crate::ops::{Op, Transaction};
use crate::plugin::indent_limit;

/// Attributes requested alongside a type change. `None` keeps (or derives) the
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeOptions {
    pub indent_level: Option<u8>,
    /// `Some(false)` on a quote-grouped block also means "leave the quote", which
    /// lifts the quote restrictions for that change.
    pub in_quote: Option<bool>,
    pub checked: Option<bool>,
    pub src: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeChange {
    Unchanged,
    Replaced,
}

/// Checks a prospective type change against the nesting rules, in order.
pub fn check_nesting(
    block: &Block,
    scope: Scope,
    target: BlockType,
    options: &TypeOptions,
) -> Result<(), NestingViolation> {
    let leaving_quote = options.in_quote == Some(false);
    if block.is_quote() && target.forbidden_in_quote() && !leaving_quote {
        return Err(NestingViolation::InsideQuote);
    }
    if target == BlockType::Toggle && matches!(scope, Scope::Toggle(_)) {
        return Err(NestingViolation::ToggleInToggle);
    }
    if target == BlockType::Image && scope.is_container() {
        return Err(NestingViolation::ImageInContainer);
    }
    Ok(())
}

fn is_noop(
    block: &Block,
    target: BlockType,
    list_type: Option<ListType>,
    options: &TypeOptions,
) -> bool {
    if block.block_type() != target {
        return false;
    }
    let same = |requested: Option<u8>, current: u8| requested.is_none_or(|r| r == current);
    match &block.content {
        BlockContent::Paragraph {
            indent_level,
            in_quote,
            ..
        } => same(options.indent_level, *indent_level) && options.in_quote.is_none_or(|q| q == *in_quote),
        BlockContent::ListItem {
            list_type: current,
            indent_level,
            ..
        } => list_type.is_none_or(|l| l == *current) && same(options.indent_level, *indent_level),
        BlockContent::Todo {
            checked,
            indent_level,
            ..
        } => options.checked.is_none_or(|c| c == *checked) && same(options.indent_level, *indent_level),
        BlockContent::Image { src } => options.src.is_none() || options.src == *src,
        _ => true,
    }
}

/// Builds the block that replaces `block` when it becomes `target`. The id is
/// kept. Containers give up their primary text and drop the rest of their
/// children; new containers get fresh child ids from `ids`.
pub fn transition(
    block: &Block,
    target: BlockType,
    list_type: Option<ListType>,
    options: &TypeOptions,
    config: &EditorConfig,
    ids: &mut IdAllocator,
) -> Block {
    let html = block.primary_html();
    let indent_level = options.indent_level.unwrap_or(block.indent_level());

    let content = match target {
        BlockType::Paragraph => BlockContent::Paragraph {
            html,
            indent_level,
            in_quote: options.in_quote.unwrap_or(block.is_quote()),
        },
        BlockType::H1 | BlockType::H2 | BlockType::H3 => BlockContent::Heading {
            level: HeadingLevel::from_block_type(target).unwrap_or(HeadingLevel::One),
            html,
        },
        BlockType::ListItem => BlockContent::ListItem {
            list_type: list_type
                .or(block.list_type())
                .unwrap_or(ListType::Unordered),
            html,
            indent_level,
        },
        BlockType::Todo => BlockContent::Todo {
            html,
            checked: options.checked.unwrap_or(match block.content {
                BlockContent::Todo { checked, .. } => checked,
                _ => false,
            }),
            indent_level,
        },
        BlockType::Quote => BlockContent::Quote { html },
        BlockType::Toggle => BlockContent::Toggle {
            title_html: html,
            is_open: false,
            children: vec![Block::paragraph(ids.next_id(), "")],
        },
        BlockType::Callout => BlockContent::Callout {
            children: vec![Block::paragraph(ids.next_id(), html)],
        },
        BlockType::Image => BlockContent::Image {
            src: options.src.clone().or(match &block.content {
                BlockContent::Image { src } => src.clone(),
                _ => None,
            }),
        },
    };

    let mut next = Block::new(block.id, content);
    let limit = indent_limit(&next, config);
    if next.indent_level() > limit {
        next.set_indent_level(limit);
    }
    next
}

impl Editor {
    /// Converts a block to another variant in place.
    ///
    /// Illegal nesting is refused before anything changes and flashes the block.
    /// A request that matches the current state returns [`TypeChange::Unchanged`]
    /// without touching the tree or the history.
    pub fn change_type(
        &mut self,
        id: BlockId,
        target: BlockType,
        list_type: Option<ListType>,
        options: TypeOptions,
    ) -> Result<TypeChange, EditError> {
        let path = self.path_of(id).ok_or(EditError::BlockNotFound(id))?;
        let scope = scope_for_path(self.blocks(), &path);
        let block = block_at(self.blocks(), &path)
            .cloned()
            .ok_or(EditError::BlockNotFound(id))?;

        if let Err(reason) = check_nesting(&block, scope, target, &options) {
            debug!(id, %reason, "type change refused");
            self.flash(id);
            return Err(EditError::IllegalNesting { id, reason });
        }

        if is_noop(&block, target, list_type, &options) {
            return Ok(TypeChange::Unchanged);
        }

        let config = self.config().clone();
        let next = transition(&block, target, list_type, &options, &config, self.ids_mut());
        let caret = match &next.content {
            BlockContent::Callout { children } => children
                .first()
                .map(|child| Caret::end(child.id))
                .unwrap_or(Caret::start(id)),
            _ => Caret::end(id),
        };

        let tx = Transaction::new(vec![Op::ReplaceBlock { path, block: next }])
            .caret_after(caret)
            .source(format!("change_type:{}", target.as_str()));
        self.apply(tx)?;
        Ok(TypeChange::Replaced)
    }
}
