//! Commonly used utilities like handles, hash containers and the handle arena.

#[macro_use]
pub mod handle;
pub mod arena;
pub mod hash;
pub mod strings;

pub mod prelude {
    pub use super::arena::{ArenaObject, HandleArena, ObjectKind};
    pub use super::handle::{HandleId, HandleLike};
    pub use super::hash::{FastHashMap, FastHashSet};
}
