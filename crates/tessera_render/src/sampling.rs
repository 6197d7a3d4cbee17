//! # Column Sampling
//!
//! Turns the block stack of one map column into a [`ColumnSample`].
//!
//! Block colors come from the host through [`ColorResolver`]. The resolver
//! only ever sees a [`SingleBlockView`]: one block and its biome, a fixed
//! 16-unit height range and constant brightness. No entity or lighting
//! data is reachable through it; callers needing those go through the full
//! world instead.
//!
//! ## Compositing
//!
//! Layers are walked top-down. The top face of each opaque layer is
//! subtracted from a [`CoverageArea`]; the newly covered fraction is that
//! layer's weight. Translucent layers tint everything below them. The walk
//! stops once the area is fully covered.

use tessera_core::ColumnSample;

use crate::color;
use crate::coverage::{CoverageArea, Rect};

/// Height range reported by [`SingleBlockView`].
pub const VIEW_HEIGHT: i32 = 16;

/// Read-only block access for color resolution.
pub trait BlockView<B, Bi> {
    /// Block at a view-local position, `None` for air.
    fn block_at(&self, x: i32, y: i32, z: i32) -> Option<&B>;

    /// Biome at a view-local position.
    fn biome_at(&self, x: i32, y: i32, z: i32) -> &Bi;

    /// Lowest valid y.
    fn min_y(&self) -> i32;

    /// Number of valid y levels above `min_y`.
    fn height(&self) -> i32;

    /// Face shading multiplier.
    fn brightness(&self, shaded: bool) -> f32;
}

/// A view holding exactly one block, at the origin.
#[derive(Debug)]
pub struct SingleBlockView<'a, B, Bi> {
    block: &'a B,
    biome: &'a Bi,
}

impl<B, Bi> Clone for SingleBlockView<'_, B, Bi> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, Bi> Copy for SingleBlockView<'_, B, Bi> {}

impl<'a, B, Bi> SingleBlockView<'a, B, Bi> {
    /// Wraps one block and its biome.
    #[must_use]
    pub const fn new(block: &'a B, biome: &'a Bi) -> Self {
        Self { block, biome }
    }

    /// The viewed block.
    #[must_use]
    pub const fn block(&self) -> &'a B {
        self.block
    }

    /// The viewed biome.
    #[must_use]
    pub const fn biome(&self) -> &'a Bi {
        self.biome
    }
}

impl<B, Bi> BlockView<B, Bi> for SingleBlockView<'_, B, Bi> {
    fn block_at(&self, x: i32, y: i32, z: i32) -> Option<&B> {
        (x == 0 && y == 0 && z == 0).then_some(self.block)
    }

    fn biome_at(&self, _x: i32, _y: i32, _z: i32) -> &Bi {
        self.biome
    }

    fn min_y(&self) -> i32 {
        0
    }

    fn height(&self) -> i32 {
        VIEW_HEIGHT
    }

    fn brightness(&self, _shaded: bool) -> f32 {
        1.0
    }
}

/// Host-supplied color resolution.
pub trait ColorResolver<B, Bi> {
    /// Packed ARGB color of the block at the view origin as seen from
    /// above. Alpha below 255 marks a translucent block.
    fn color<V: BlockView<B, Bi>>(&self, view: &V) -> u32;
}

/// One block in a column, as fed to [`ColumnSampler::sample`].
#[derive(Debug)]
pub struct BlockLayer<'a, B, Bi> {
    /// World y of the block.
    pub y: i32,
    /// The block.
    pub block: &'a B,
    /// Its biome.
    pub biome: &'a Bi,
    /// Block light above the face (0-15).
    pub light: u8,
    /// Top face outline in the unit square; empty for invisible blocks.
    pub top_face: &'a [Rect],
}

/// Composites column layers into samples.
#[derive(Debug, Default)]
pub struct ColumnSampler<R> {
    resolver: R,
}

impl<R> ColumnSampler<R> {
    /// Creates a sampler around a host resolver.
    #[must_use]
    pub const fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// The wrapped resolver.
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Samples one column from its layers, topmost first.
    ///
    /// Height and light are taken from the first layer that contributes.
    /// A column where nothing contributes yields [`ColumnSample::EMPTY`].
    pub fn sample<'a, B, Bi, I>(&self, layers: I) -> ColumnSample
    where
        B: 'a,
        Bi: 'a,
        R: ColorResolver<B, Bi>,
        I: IntoIterator<Item = BlockLayer<'a, B, Bi>>,
    {
        let mut area = CoverageArea::new();
        let mut acc = [0.0_f64; 3];
        let mut weight = 0.0_f64;
        let mut transmit = [1.0_f64; 3];
        let mut surface: Option<(i32, u8)> = None;

        for layer in layers {
            if layer.top_face.is_empty() {
                continue;
            }
            let view = SingleBlockView::new(layer.block, layer.biome);
            let argb = self.resolver.color(&view);
            let [a, r, g, b] = color::unpack(argb);
            if a == 0 {
                continue;
            }
            let rgb = [r, g, b].map(|c| f64::from(c) / 255.0);

            let gained = if a == u8::MAX {
                let before = area.covered_fraction();
                for face in layer.top_face {
                    area.subtract_rect(face);
                }
                area.covered_fraction() - before
            } else {
                // Translucent: blend over what is still uncovered, then tint below.
                let alpha = f64::from(a) / 255.0;
                let share = (1.0 - area.covered_fraction()) * alpha;
                for (i, c) in rgb.iter().enumerate() {
                    acc[i] += share * transmit[i] * c;
                    transmit[i] *= 1.0 - alpha * (1.0 - c);
                }
                weight += share;
                share
            };

            if gained > 0.0 {
                surface.get_or_insert((layer.y, layer.light));
                if a == u8::MAX {
                    for (i, c) in rgb.iter().enumerate() {
                        acc[i] += gained * transmit[i] * c;
                    }
                    weight += gained;
                }
            }
            if area.is_empty() {
                break;
            }
        }

        let Some((y, light)) = surface else {
            return ColumnSample::EMPTY;
        };
        let channel = |i: usize| (acc[i] / weight * 255.0).round().clamp(0.0, 255.0) as u8;
        let alpha = (weight.min(1.0) * 255.0).round() as u8;
        let height = y.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        ColumnSample::new(
            color::pack(alpha, channel(0), channel(1), channel(2)),
            height,
            light.min(15),
        )
    }
}
