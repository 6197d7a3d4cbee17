//! # Region Render Context
//!
//! Composites one region's chunks into a 512x512 ARGB pixel buffer.
//!
//! ## Flow
//!
//! ```text
//!   begin_chunk(cx, cz) ── chunk resident? ──no──► clear 16x16 footprint, false
//!                                │
//!                               yes
//!                                ▼
//!               rebuild HeightLightCache from chunk + 8 neighbors
//!                                ▼
//!   render_chunk / set_color(x, z, argb) ──► pixels[(oz + z) * 512 + ox + x]
//! ```
//!
//! The context never loads or creates anything: it looks chunks up without
//! creating them and renders "no data yet" as transparent, so a render pass
//! never waits on storage. The region lease it holds keeps the region
//! resident for the duration of the pass.
//!
//! A context belongs to one render pass. An abandoned pass simply drops it;
//! its partially written buffer is never presented.

use std::sync::Arc;

use tessera_core::{
    ChunkCoord, ChunkSlot, ColumnSamples, MapCache, RegionCoord, RegionLease, StorageAdapter,
    WorldId, CHUNK_BLOCKS, REGION_BLOCKS,
};

use crate::color;
use crate::height_light::{HeightLightCache, NEIGHBOR_OFFSETS};

/// Pixels in a region buffer.
pub const REGION_PIXELS: usize = REGION_BLOCKS * REGION_BLOCKS;

/// Light factor floor (of 256) for unlit columns.
const LIGHT_FLOOR: u32 = 176;

/// Brightness change (of 256) per block of height difference.
const SLOPE_STEP: i32 = 12;

/// Largest height difference that still changes shading.
const SLOPE_CLAMP: i32 = 8;

struct ActiveChunk<C> {
    slot: ChunkSlot,
    chunk: Arc<C>,
}

/// Per-pass compositing state for one region.
pub struct RegionRenderContext<'c, A: StorageAdapter> {
    cache: &'c MapCache<A>,
    world: WorldId,
    region: RegionCoord,
    lease: Option<RegionLease<A>>,
    pixels: Box<[u32]>,
    /// Per-pixel channel accumulator `[a, r, g, b]`.
    scratch: [u32; 4],
    active: Option<ActiveChunk<A::Chunk>>,
    heights: HeightLightCache,
}

impl<'c, A> RegionRenderContext<'c, A>
where
    A: StorageAdapter,
    A::Chunk: ColumnSamples,
{
    /// Starts a pass over `region`.
    ///
    /// Only a region already resident in `cache` can be drawn; otherwise
    /// every chunk takes the transparent fallback.
    #[must_use]
    pub fn new(cache: &'c MapCache<A>, world: WorldId, region: RegionCoord) -> Self {
        let lease = cache.peek_region(world, region);
        if lease.is_none() {
            tracing::trace!(%world, region_x = region.x, region_z = region.z, "region not resident");
        }
        Self {
            cache,
            world,
            region,
            lease,
            pixels: vec![color::TRANSPARENT; REGION_PIXELS].into_boxed_slice(),
            scratch: [0; 4],
            active: None,
            heights: HeightLightCache::default(),
        }
    }

    /// World being rendered.
    #[must_use]
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Region being rendered.
    #[must_use]
    pub fn region(&self) -> RegionCoord {
        self.region
    }

    /// Returns true if the region was resident when the pass started.
    #[must_use]
    pub fn has_region(&self) -> bool {
        self.lease.is_some()
    }

    /// Selects the chunk at region-local `(chunk_x, chunk_z)`.
    ///
    /// Returns false, after clearing the chunk's 16x16 pixels to
    /// transparent, if the chunk is not resident.
    ///
    /// # Panics
    ///
    /// Panics if either coordinate is 32 or more.
    pub fn begin_chunk(&mut self, chunk_x: usize, chunk_z: usize) -> bool {
        let slot = ChunkSlot::new(chunk_x, chunk_z);
        let chunk = self
            .lease
            .as_ref()
            .and_then(|region| self.cache.get_chunk(region, slot, false));

        let Some(chunk) = chunk else {
            self.active = None;
            self.clear_footprint(slot);
            return false;
        };

        let center = self.region.chunk(slot);
        let neighbors = NEIGHBOR_OFFSETS.map(|(dx, dz)| self.neighbor(center.offset(dx, dz)));
        let refs: [Option<&A::Chunk>; 8] = std::array::from_fn(|i| neighbors[i].as_deref());
        self.heights.rebuild(&*chunk, refs);
        self.active = Some(ActiveChunk { slot, chunk });
        true
    }

    fn neighbor(&self, coord: ChunkCoord) -> Option<Arc<A::Chunk>> {
        if coord.region() == self.region {
            self.lease.as_ref()?.chunk(coord.slot())
        } else {
            self.cache.chunk_at(self.world, coord)
        }
    }

    fn clear_footprint(&mut self, slot: ChunkSlot) {
        let (ox, oz) = slot.block_origin();
        for z in 0..CHUNK_BLOCKS {
            let row = (oz + z) * REGION_BLOCKS + ox;
            self.pixels[row..row + CHUNK_BLOCKS].fill(color::TRANSPARENT);
        }
    }

    /// Writes one pixel of the active chunk at chunk-local `(x, z)`.
    ///
    /// # Panics
    ///
    /// Panics if no chunk is active or a coordinate is 16 or more.
    #[inline]
    pub fn set_color(&mut self, x: usize, z: usize, argb: u32) {
        let Some(active) = &self.active else {
            panic!("set_color called without an active chunk");
        };
        assert!(
            x < CHUNK_BLOCKS && z < CHUNK_BLOCKS,
            "pixel ({x}, {z}) outside chunk"
        );
        let (ox, oz) = active.slot.block_origin();
        self.pixels[(oz + z) * REGION_BLOCKS + ox + x] = argb;
    }

    /// Height/light window of the active chunk.
    #[must_use]
    pub fn heights(&self) -> &HeightLightCache {
        &self.heights
    }

    /// Shades every column of the active chunk into the buffer.
    ///
    /// Columns facing north-west uphill are brightened, downhill darkened;
    /// unknown neighbor heights contribute no slope. Block light scales the
    /// result between `LIGHT_FLOOR` and full brightness.
    ///
    /// # Panics
    ///
    /// Panics if no chunk is active.
    pub fn render_chunk(&mut self) {
        let Some(active) = &self.active else {
            panic!("render_chunk called without an active chunk");
        };
        let chunk = Arc::clone(&active.chunk);

        for z in 0..CHUNK_BLOCKS {
            for x in 0..CHUNK_BLOCKS {
                let sample = chunk.column(x, z);
                let argb = if sample.is_known() {
                    self.shade(x as i32, z as i32, sample.argb)
                } else {
                    color::TRANSPARENT
                };
                self.set_color(x, z, argb);
            }
        }
    }

    fn shade(&mut self, x: i32, z: i32, argb: u32) -> u32 {
        let slope = self.heights.height(x, z).map_or(0, |h| {
            let rise = |other: Option<i16>| {
                other.map_or(0, |o| (i32::from(h) - i32::from(o)).clamp(-SLOPE_CLAMP, SLOPE_CLAMP))
            };
            rise(self.heights.height(x, z - 1)) + rise(self.heights.height(x - 1, z))
        });
        let slope_factor = (256 + slope * SLOPE_STEP).clamp(128, 384) as u32;
        let light = u32::from(self.heights.light(x, z).min(15));
        let light_factor = LIGHT_FLOOR + (256 - LIGHT_FLOOR) * light / 15;

        self.scratch = color::unpack(argb).map(u32::from);
        for channel in &mut self.scratch[1..] {
            *channel = ((((*channel * slope_factor) >> 8) * light_factor) >> 8).min(255);
        }
        let [a, r, g, b] = self.scratch;
        color::pack(a as u8, r as u8, g as u8, b as u8)
    }

    /// Draws every chunk of the region. Returns the number drawn.
    pub fn render_region(&mut self) -> usize {
        let mut drawn = 0;
        for slot in ChunkSlot::all() {
            if self.begin_chunk(slot.x(), slot.z()) {
                self.render_chunk();
                drawn += 1;
            }
        }
        self.active = None;
        tracing::debug!(
            world = %self.world,
            region_x = self.region.x,
            region_z = self.region.z,
            drawn,
            "rendered region"
        );
        drawn
    }

    /// The pixel buffer, row-major, `512 * 512` entries.
    #[must_use]
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel at region-local block `(x, z)`.
    #[must_use]
    pub fn pixel(&self, x: usize, z: usize) -> u32 {
        self.pixels[z * REGION_BLOCKS + x]
    }

    /// Finishes the pass, releasing the region and keeping the buffer.
    #[must_use]
    pub fn into_pixels(self) -> Box<[u32]> {
        self.pixels
    }
}

impl<A: StorageAdapter> std::fmt::Debug for RegionRenderContext<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionRenderContext")
            .field("world", &self.world)
            .field("region", &self.region)
            .field("resident", &self.lease.is_some())
            .field("active", &self.active.as_ref().map(|a| a.slot))
            .finish_non_exhaustive()
    }
}
