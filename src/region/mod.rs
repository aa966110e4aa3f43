pub mod archive;
pub mod coords;

pub use archive::{RegionArchive, RegionError, RegionResult, SCHEME_ZLIB, SECTOR_BYTES, SLOT_COUNT};
pub use coords::{RegionPos, RegionRect, REGION_BLOCK_EDGE, REGION_CHUNK_EDGE};
