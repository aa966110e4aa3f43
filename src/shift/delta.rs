use std::fmt;

use crate::error::ConfigError;
use crate::region::coords::{CHUNK_BLOCK_EDGE, REGION_BLOCK_EDGE};

/// Block-unit offset applied to every coordinate-bearing field. Always a whole
/// number of regions on both axes, so chunks keep their grid slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShiftDelta {
    dx: i64,
    dz: i64,
}

impl ShiftDelta {
    pub const ZERO: ShiftDelta = ShiftDelta { dx: 0, dz: 0 };

    pub fn new(dx: i64, dz: i64) -> Result<Self, ConfigError> {
        if dx.rem_euclid(REGION_BLOCK_EDGE) != 0 || dz.rem_euclid(REGION_BLOCK_EDGE) != 0 {
            return Err(ConfigError::UnalignedShift { dx, dz });
        }
        Ok(Self { dx, dz })
    }

    pub fn from_regions(rx: i32, rz: i32) -> Self {
        Self {
            dx: rx as i64 * REGION_BLOCK_EDGE,
            dz: rz as i64 * REGION_BLOCK_EDGE,
        }
    }

    pub fn dx(self) -> i64 {
        self.dx
    }

    pub fn dz(self) -> i64 {
        self.dz
    }

    pub fn chunk_offset(self) -> (i64, i64) {
        (self.dx / CHUNK_BLOCK_EDGE, self.dz / CHUNK_BLOCK_EDGE)
    }

    pub fn region_offset(self) -> (i64, i64) {
        (self.dx / REGION_BLOCK_EDGE, self.dz / REGION_BLOCK_EDGE)
    }

    pub fn negated(self) -> Self {
        Self {
            dx: -self.dx,
            dz: -self.dz,
        }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self {
            dx: self.dx.checked_add(other.dx)?,
            dz: self.dz.checked_add(other.dz)?,
        })
    }
}

impl fmt::Display for ShiftDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}) blocks", self.dx, self.dz)
    }
}
