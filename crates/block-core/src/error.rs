use thiserror::Error;

use crate::block::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NestingViolation {
    /// Lists, headings, containers and images may not live in a quote run.
    #[error("block type is not allowed inside a quote")]
    InsideQuote,
    #[error("toggle cannot be nested in a toggle")]
    ToggleInToggle,
    #[error("image cannot be placed in a callout or toggle")]
    ImageInContainer,
    #[error("container cannot be moved into itself")]
    ContainerIntoItself,
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct PathError(pub String);

#[derive(Debug, Error)]
pub enum EditError {
    #[error("block {id}: {reason}")]
    IllegalNesting {
        id: BlockId,
        reason: NestingViolation,
    },
    #[error("block {id} cannot change indent")]
    IndentRefused { id: BlockId },
    #[error("block {0} not found")]
    BlockNotFound(BlockId),
    #[error("invalid move: {0}")]
    InvalidMove(String),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl EditError {
    /// Block to flash when the request is refused.
    pub fn offending_block(&self) -> Option<BlockId> {
        match self {
            Self::IllegalNesting { id, .. } | Self::IndentRefused { id } => Some(*id),
            Self::BlockNotFound(_) | Self::InvalidMove(_) | Self::Apply(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("document {0} not found")]
    DocumentNotFound(u64),
}
