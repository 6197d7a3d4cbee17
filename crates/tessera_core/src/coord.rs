//! # Map Coordinates
//!
//! World space is divided into chunks of 16x16 block columns, and chunks are
//! grouped into regions of 32x32 chunks (512x512 blocks).
//!
//! ```text
//!   world block (bx, bz)
//!        │  div_euclid(16)
//!        ▼
//!   ChunkCoord (cx, cz) ──div_euclid(32)──► RegionCoord (rx, rz)
//!        │  rem_euclid(32)
//!        ▼
//!   ChunkSlot (0..32, 0..32)  index = z * 32 + x
//! ```
//!
//! All conversions use Euclidean division so negative coordinates map to the
//! correct region.

use std::fmt;

/// Chunk width/depth in blocks.
pub const CHUNK_BLOCKS: usize = 16;

/// Block columns per chunk.
pub const CHUNK_COLUMNS: usize = CHUNK_BLOCKS * CHUNK_BLOCKS;

/// Region width/depth in chunks.
pub const REGION_CHUNKS: usize = 32;

/// Chunk slots per region.
pub const CHUNK_SLOTS: usize = REGION_CHUNKS * REGION_CHUNKS;

/// Region width/depth in blocks (and in rendered pixels).
pub const REGION_BLOCKS: usize = REGION_CHUNKS * CHUNK_BLOCKS;

/// Identifies one world (dimension) whose regions are cached independently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldId(pub u32);

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Region coordinate (in regions, not chunks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCoord {
    /// X coordinate.
    pub x: i32,
    /// Z coordinate.
    pub z: i32,
}

impl RegionCoord {
    /// Creates a new region coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Region containing the given world block position.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        ChunkCoord::from_block_pos(block_x, block_z).region()
    }

    /// World chunk coordinate of the chunk at `slot` in this region.
    #[inline]
    #[must_use]
    pub const fn chunk(self, slot: ChunkSlot) -> ChunkCoord {
        ChunkCoord {
            x: self.x * REGION_CHUNKS as i32 + slot.x as i32,
            z: self.z * REGION_CHUNKS as i32 + slot.z as i32,
        }
    }

    /// World block coordinate of the region's origin (north-west corner).
    #[inline]
    #[must_use]
    pub const fn block_origin(self) -> (i32, i32) {
        (self.x * REGION_BLOCKS as i32, self.z * REGION_BLOCKS as i32)
    }
}

impl fmt::Display for RegionCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r.{}.{}", self.x, self.z)
    }
}

/// Chunk coordinate in world space (in chunks, not blocks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    /// X coordinate.
    pub x: i32,
    /// Z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to the containing chunk.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_BLOCKS as i32),
            z: block_z.div_euclid(CHUNK_BLOCKS as i32),
        }
    }

    /// Region that owns this chunk.
    #[inline]
    #[must_use]
    pub const fn region(self) -> RegionCoord {
        RegionCoord {
            x: self.x.div_euclid(REGION_CHUNKS as i32),
            z: self.z.div_euclid(REGION_CHUNKS as i32),
        }
    }

    /// Slot of this chunk inside its region.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> ChunkSlot {
        ChunkSlot {
            x: self.x.rem_euclid(REGION_CHUNKS as i32) as u8,
            z: self.z.rem_euclid(REGION_CHUNKS as i32) as u8,
        }
    }

    /// Chunk displaced by `(dx, dz)` chunks.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }

    /// World X coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn block_x(self) -> i32 {
        self.x * CHUNK_BLOCKS as i32
    }

    /// World Z coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn block_z(self) -> i32 {
        self.z * CHUNK_BLOCKS as i32
    }
}

/// Position of a chunk inside its region grid.
///
/// Always within `0..REGION_CHUNKS` on both axes; constructing one outside
/// the grid is a caller bug and panics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkSlot {
    x: u8,
    z: u8,
}

impl ChunkSlot {
    /// Creates a slot from region-relative chunk coordinates.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is outside the region grid.
    #[inline]
    #[must_use]
    pub fn new(x: usize, z: usize) -> Self {
        assert!(
            x < REGION_CHUNKS && z < REGION_CHUNKS,
            "chunk slot ({x}, {z}) outside the {REGION_CHUNKS}x{REGION_CHUNKS} region grid"
        );
        Self {
            x: x as u8,
            z: z as u8,
        }
    }

    /// Rebuilds a slot from its flat index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= CHUNK_SLOTS`.
    #[inline]
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        assert!(index < CHUNK_SLOTS, "chunk slot index {index} out of range");
        Self::new(index % REGION_CHUNKS, index / REGION_CHUNKS)
    }

    /// Region-relative chunk X.
    #[inline]
    #[must_use]
    pub const fn x(self) -> usize {
        self.x as usize
    }

    /// Region-relative chunk Z.
    #[inline]
    #[must_use]
    pub const fn z(self) -> usize {
        self.z as usize
    }

    /// Flat row-major index, always `< CHUNK_SLOTS`.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.z as usize * REGION_CHUNKS + self.x as usize
    }

    /// Region-relative block coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn block_origin(self) -> (usize, usize) {
        (self.x as usize * CHUNK_BLOCKS, self.z as usize * CHUNK_BLOCKS)
    }

    /// Iterates every slot of a region in index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHUNK_SLOTS).map(Self::from_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_block_positions() {
        let chunk = ChunkCoord::from_block_pos(-1, -17);
        assert_eq!(chunk, ChunkCoord::new(-1, -2));
        assert_eq!(chunk.region(), RegionCoord::new(-1, -1));
        assert_eq!(chunk.slot(), ChunkSlot::new(31, 30));
    }

    #[test]
    fn test_region_chunk_roundtrip() {
        let region = RegionCoord::new(-3, 2);
        for slot in [ChunkSlot::new(0, 0), ChunkSlot::new(31, 31), ChunkSlot::new(5, 17)] {
            let chunk = region.chunk(slot);
            assert_eq!(chunk.region(), region);
            assert_eq!(chunk.slot(), slot);
        }
    }

    #[test]
    fn test_slot_index() {
        assert_eq!(ChunkSlot::new(0, 0).index(), 0);
        assert_eq!(ChunkSlot::new(31, 0).index(), 31);
        assert_eq!(ChunkSlot::new(0, 1).index(), 32);
        assert_eq!(ChunkSlot::new(31, 31).index(), CHUNK_SLOTS - 1);
        assert_eq!(ChunkSlot::from_index(33), ChunkSlot::new(1, 1));
        assert_eq!(ChunkSlot::all().count(), CHUNK_SLOTS);
    }

    #[test]
    fn test_block_origins() {
        assert_eq!(ChunkSlot::new(2, 3).block_origin(), (32, 48));
        assert_eq!(RegionCoord::new(-1, 1).block_origin(), (-512, 512));
        assert_eq!(RegionCoord::from_block_pos(511, 512), RegionCoord::new(0, 1));
    }

    #[test]
    #[should_panic(expected = "outside the 32x32 region grid")]
    fn test_slot_out_of_grid_panics() {
        let _ = ChunkSlot::new(32, 0);
    }
}
