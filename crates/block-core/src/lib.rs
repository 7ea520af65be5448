mod block;
mod core;
mod decorate;
mod edit;
mod error;
pub mod inline;
mod moves;
mod ops;
mod plugin;
mod render;
mod serde_value;
mod session;
mod transform;

pub use crate::block::*;
pub use crate::core::*;
pub use crate::decorate::*;
pub use crate::error::*;
pub use crate::moves::*;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::render::*;
pub use crate::serde_value::*;
pub use crate::session::*;
pub use crate::transform::*;
