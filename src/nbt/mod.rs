//! Named binary tag trees: the generic payload model stored inside each chunk.

pub mod codec;
mod mutf8;
pub mod tag;

pub use codec::{decode, encode, NbtError};
pub use tag::{Compound, NamedTag, Tag, TagError, TagKind, TagList};
