//! # Height/Light Cache
//!
//! Read-only snapshot of surface heights and block light over an 18x18
//! window: the active chunk plus a one-column border taken from its eight
//! neighbors, so slope shading at chunk edges sees across the seam.
//!
//! ```text
//!        -1   0 ........ 15  16
//!   -1  [NW][     N      ][NE]
//!    0  [  ][            ][  ]
//!    :  [W ][   center   ][E ]
//!   15  [  ][            ][  ]
//!   16  [SW][     S      ][SE]
//! ```
//!
//! Columns of missing neighbors, and columns without sampled data, have an
//! unknown height (`None`) and light 0.

use tessera_core::{ColumnSample, ColumnSamples, CHUNK_BLOCKS};

/// Window edge: one chunk plus a border column on each side.
pub const WINDOW: usize = CHUNK_BLOCKS + 2;

const EDGE: i32 = CHUNK_BLOCKS as i32;

/// Chunk offsets of the neighbor array, in order.
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Heights and light around one chunk.
#[derive(Clone)]
pub struct HeightLightCache {
    heights: [Option<i16>; WINDOW * WINDOW],
    light: [u8; WINDOW * WINDOW],
}

impl Default for HeightLightCache {
    fn default() -> Self {
        Self {
            heights: [None; WINDOW * WINDOW],
            light: [0; WINDOW * WINDOW],
        }
    }
}

impl HeightLightCache {
    /// Builds the window for `center` with neighbors ordered as
    /// [`NEIGHBOR_OFFSETS`].
    #[must_use]
    pub fn build<C: ColumnSamples + ?Sized>(center: &C, neighbors: [Option<&C>; 8]) -> Self {
        let mut cache = Self::default();
        cache.rebuild(center, neighbors);
        cache
    }

    /// Refills the window in place.
    pub fn rebuild<C: ColumnSamples + ?Sized>(&mut self, center: &C, neighbors: [Option<&C>; 8]) {
        for wz in -1..=EDGE {
            for wx in -1..=EDGE {
                let dx = chunk_step(wx);
                let dz = chunk_step(wz);
                let source = if dx == 0 && dz == 0 {
                    Some(center)
                } else {
                    neighbor_index(dx, dz).and_then(|i| neighbors[i])
                };

                let sample = source.map_or(ColumnSample::EMPTY, |c| {
                    c.column(wx.rem_euclid(EDGE) as usize, wz.rem_euclid(EDGE) as usize)
                });
                let index = window_index(wx, wz);
                if sample.is_known() {
                    self.heights[index] = Some(sample.height);
                    self.light[index] = sample.light;
                } else {
                    self.heights[index] = None;
                    self.light[index] = 0;
                }
            }
        }
    }

    /// Surface height at chunk-local `(x, z)`, each in `-1..=16`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the window.
    #[inline]
    #[must_use]
    pub fn height(&self, x: i32, z: i32) -> Option<i16> {
        self.heights[window_index(x, z)]
    }

    /// Block light at chunk-local `(x, z)`, each in `-1..=16`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the window.
    #[inline]
    #[must_use]
    pub fn light(&self, x: i32, z: i32) -> u8 {
        self.light[window_index(x, z)]
    }
}

impl std::fmt::Debug for HeightLightCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let known = self.heights.iter().filter(|h| h.is_some()).count();
        f.debug_struct("HeightLightCache")
            .field("known_columns", &known)
            .finish_non_exhaustive()
    }
}

#[inline]
fn chunk_step(local: i32) -> i32 {
    if local < 0 {
        -1
    } else if local >= EDGE {
        1
    } else {
        0
    }
}

fn neighbor_index(dx: i32, dz: i32) -> Option<usize> {
    NEIGHBOR_OFFSETS.iter().position(|&o| o == (dx, dz))
}

#[inline]
fn window_index(x: i32, z: i32) -> usize {
    assert!(
        (-1..=EDGE).contains(&x) && (-1..=EDGE).contains(&z),
        "column ({x}, {z}) outside the height/light window"
    );
    (z + 1) as usize * WINDOW + (x + 1) as usize
}
