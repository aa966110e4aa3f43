//! Block / chunk / region unit sizes and region file naming.

pub const CHUNK_BLOCK_EDGE: i64 = 16;
pub const REGION_CHUNK_EDGE: i32 = 32;
pub const REGION_BLOCK_EDGE: i64 = CHUNK_BLOCK_EDGE * REGION_CHUNK_EDGE as i64;

pub const DEFAULT_REGION_EXTENSION: &str = "mca";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn checked_offset(self, dx: i32, dz: i32) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            z: self.z.checked_add(dz)?,
        })
    }

    pub fn file_name(self, extension: &str) -> String {
        format!("r.{}.{}.{}", self.x, self.z, extension)
    }

    /// Parses `r.<x>.<z>.<extension>`. Coordinates are plain decimal with an
    /// optional leading `-`.
    pub fn parse_file_name(name: &str, extension: &str) -> Option<Self> {
        let rest = name.strip_prefix("r.")?;
        let rest = rest.strip_suffix(extension)?.strip_suffix('.')?;
        let (x, z) = rest.split_once('.')?;
        Some(Self {
            x: parse_signed_decimal(x)?,
            z: parse_signed_decimal(z)?,
        })
    }
}

fn parse_signed_decimal(text: &str) -> Option<i32> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Half-open rectangle of region coordinates: `[x0, x1) × [z0, z1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionRect {
    pub x0: i32,
    pub z0: i32,
    pub x1: i32,
    pub z1: i32,
}

impl RegionRect {
    pub fn new(x0: i32, z0: i32, x1: i32, z1: i32) -> Self {
        Self { x0, z0, x1, z1 }
    }

    pub fn contains(&self, pos: RegionPos) -> bool {
        pos.x >= self.x0 && pos.x < self.x1 && pos.z >= self.z0 && pos.z < self.z1
    }
}
