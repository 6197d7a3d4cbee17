//! # TESSERA Render
//!
//! Region map compositing on top of the `tessera_core` cache.
//!
//! ## Design Principles
//!
//! 1. **Never wait**: only resident chunks are drawn; everything else is a
//!    transparent 16x16 footprint until the background worker loads it
//! 2. **Seamless edges**: slope shading reads heights across chunk and
//!    region borders through a per-chunk [`HeightLightCache`]
//! 3. **Exclusive buffers**: a [`RegionRenderContext`] owns its pixels and
//!    scratch accumulator and is never shared between passes
//!
//! ## Core Components
//!
//! - `RegionRenderContext`: 512x512 ARGB buffer for one region
//! - `HeightLightCache`: 18x18 height/light window around the active chunk
//! - `CoverageArea`: disjoint-rectangle coverage of a unit square
//! - `ColumnSampler`: turns block stacks into column samples through a host
//!   `ColorResolver` that only sees a `SingleBlockView`

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod color;
pub mod context;
pub mod coverage;
pub mod height_light;
pub mod sampling;

pub use context::{RegionRenderContext, REGION_PIXELS};
pub use coverage::{CoverageArea, Rect};
pub use height_light::{HeightLightCache, NEIGHBOR_OFFSETS};
pub use sampling::{BlockLayer, BlockView, ColorResolver, ColumnSampler, SingleBlockView};
