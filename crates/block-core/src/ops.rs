use crate::block::Block;
use crate::core::Caret;

/// Index path into the block tree: top-level index, then child indices inside
/// containers.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    InsertBlock { path: Path, block: Block },
    RemoveBlock { path: Path },
    ReplaceBlock { path: Path, block: Block },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionMeta {
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub ops: Vec<Op>,
    pub caret_after: Option<Caret>,
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            caret_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn caret_after(mut self, caret: Caret) -> Self {
        self.caret_after = Some(caret);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }
}
