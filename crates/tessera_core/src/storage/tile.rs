//! # Tile Chunks
//!
//! The built-in map tile representation: one `ColumnSample` per block
//! column, already resolved by the host (color, surface height, light).
//!
//! Two adapters persist it:
//!
//! | adapter | context | chunk body |
//! |---|---|---|
//! | `RawTileAdapter` | `()` | 256 Pod samples, 2 KiB |
//! | `PaletteTileAdapter` | `ColorPalette` | palette index + height + light |
//!
//! The palette is shared by every chunk of a region, which is what makes it
//! a decode *context* rather than part of a chunk.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::coord::{ChunkCoord, RegionCoord, CHUNK_BLOCKS, CHUNK_COLUMNS};
use crate::error::{StorageError, StorageResult};
use crate::storage::adapter::StorageAdapter;
use crate::storage::bytes::{ByteReader, ByteWriter};

/// Per-column derived sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct ColumnSample {
    /// Packed ARGB color of the column as seen from above.
    pub argb: u32,
    /// Y of the topmost visible block.
    pub height: i16,
    /// Block light at the surface (0-15).
    pub light: u8,
    /// Bit flags, see `ColumnSample::KNOWN`.
    pub flags: u8,
}

impl ColumnSample {
    /// Flag set on columns that carry sampled data.
    pub const KNOWN: u8 = 1;

    /// Column with no data.
    pub const EMPTY: Self = Self {
        argb: 0,
        height: 0,
        light: 0,
        flags: 0,
    };

    /// Creates a known sample.
    #[inline]
    #[must_use]
    pub const fn new(argb: u32, height: i16, light: u8) -> Self {
        Self {
            argb,
            height,
            light,
            flags: Self::KNOWN,
        }
    }

    /// Returns true if the column has sampled data.
    #[inline]
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.flags & Self::KNOWN != 0
    }
}

/// Read access to per-column samples, implemented by renderable chunk types.
pub trait ColumnSamples {
    /// Sample at chunk-local column `(x, z)`, both `< 16`.
    fn column(&self, x: usize, z: usize) -> ColumnSample;
}

/// A 16x16 chunk of column samples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileChunk {
    /// Samples indexed as `z * 16 + x`.
    samples: Box<[ColumnSample; CHUNK_COLUMNS]>,
}

impl TileChunk {
    /// Creates a chunk with every column empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Box::new([ColumnSample::EMPTY; CHUNK_COLUMNS]),
        }
    }

    #[inline]
    fn index(x: usize, z: usize) -> usize {
        assert!(
            x < CHUNK_BLOCKS && z < CHUNK_BLOCKS,
            "column ({x}, {z}) outside chunk"
        );
        z * CHUNK_BLOCKS + x
    }

    /// Gets the sample at a local column.
    #[inline]
    #[must_use]
    pub fn sample(&self, x: usize, z: usize) -> ColumnSample {
        self.samples[Self::index(x, z)]
    }

    /// Sets the sample at a local column.
    #[inline]
    pub fn set_sample(&mut self, x: usize, z: usize, sample: ColumnSample) {
        self.samples[Self::index(x, z)] = sample;
    }

    /// All samples in `z * 16 + x` order.
    #[must_use]
    pub fn samples(&self) -> &[ColumnSample] {
        self.samples.as_slice()
    }

    /// Number of columns carrying data.
    #[must_use]
    pub fn known_columns(&self) -> usize {
        self.samples.iter().filter(|s| s.is_known()).count()
    }

    /// Returns true if no column carries data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known_columns() == 0
    }
}

impl Default for TileChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnSamples for TileChunk {
    #[inline]
    fn column(&self, x: usize, z: usize) -> ColumnSample {
        self.sample(x, z)
    }
}

/// Region payload shared by the tile adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRegion {
    /// Coordinates the region was written for.
    pub coord: RegionCoord,
}

fn read_tile_region(coord: RegionCoord, reader: &mut ByteReader<'_>) -> StorageResult<TileRegion> {
    let stored = RegionCoord::new(reader.read_i32()?, reader.read_i32()?);
    if stored != coord {
        return Err(StorageError::Corrupt(format!(
            "region payload is for {stored}, loaded as {coord}"
        )));
    }
    Ok(TileRegion { coord })
}

fn write_tile_region(region: &TileRegion, writer: &mut ByteWriter) {
    writer.write_i32(region.coord.x);
    writer.write_i32(region.coord.z);
}

/// Byte size of a raw chunk body.
const RAW_CHUNK_BYTES: usize = CHUNK_COLUMNS * std::mem::size_of::<ColumnSample>();

/// Stores samples verbatim.
///
/// Samples are copied as native-endian Pod bytes; region files are not
/// portable across byte orders.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawTileAdapter;

impl StorageAdapter for RawTileAdapter {
    type Region = TileRegion;
    type Chunk = TileChunk;
    type Context = ();

    const NAME: &'static str = "raw_tiles";

    fn new_region(&self, coord: RegionCoord) -> TileRegion {
        TileRegion { coord }
    }

    fn new_chunk(&self, _region: &TileRegion, _coord: ChunkCoord) -> TileChunk {
        TileChunk::new()
    }

    fn read_region(
        &self,
        coord: RegionCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<TileRegion> {
        read_tile_region(coord, reader)
    }

    fn write_region(&self, region: &TileRegion, writer: &mut ByteWriter) {
        write_tile_region(region, writer);
    }

    fn read_context(&self, _reader: &mut ByteReader<'_>) -> StorageResult<()> {
        Ok(())
    }

    fn write_context(&self, _context: &(), _writer: &mut ByteWriter) {}

    fn read_chunk(
        &self,
        _region: &TileRegion,
        _context: &(),
        _coord: ChunkCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<TileChunk> {
        let bytes = reader.read_bytes(RAW_CHUNK_BYTES)?;

        let mut chunk = TileChunk::new();
        let stride = std::mem::size_of::<ColumnSample>();
        for (sample, raw) in chunk.samples.iter_mut().zip(bytes.chunks_exact(stride)) {
            *sample = bytemuck::pod_read_unaligned(raw);
        }
        Ok(chunk)
    }

    fn write_chunk(
        &self,
        _region: &TileRegion,
        _context: &mut (),
        chunk: &TileChunk,
        writer: &mut ByteWriter,
    ) {
        writer.write_bytes(bytemuck::cast_slice(chunk.samples()));
    }
}

/// Palette index marking an inline color that did not fit the palette.
const PALETTE_ESCAPE: u16 = u16::MAX;

/// Region-shared color table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorPalette {
    colors: Vec<u32>,
    index: HashMap<u32, u16>,
}

impl ColorPalette {
    /// Creates an empty palette.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `argb`, adding it if there is room.
    ///
    /// Returns `None` once the palette is full.
    pub fn intern(&mut self, argb: u32) -> Option<u16> {
        if let Some(&index) = self.index.get(&argb) {
            return Some(index);
        }
        let index = u16::try_from(self.colors.len()).ok()?;
        if index == PALETTE_ESCAPE {
            return None;
        }
        self.colors.push(argb);
        self.index.insert(argb, index);
        Some(index)
    }

    /// Color at `index`.
    #[inline]
    #[must_use]
    pub fn color(&self, index: u16) -> Option<u32> {
        self.colors.get(index as usize).copied()
    }

    /// Number of distinct colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Returns true if no color has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Stores samples as indices into a region-shared color palette.
#[derive(Clone, Copy, Debug, Default)]
pub struct PaletteTileAdapter;

impl StorageAdapter for PaletteTileAdapter {
    type Region = TileRegion;
    type Chunk = TileChunk;
    type Context = ColorPalette;

    const NAME: &'static str = "palette_tiles";

    fn new_region(&self, coord: RegionCoord) -> TileRegion {
        TileRegion { coord }
    }

    fn new_chunk(&self, _region: &TileRegion, _coord: ChunkCoord) -> TileChunk {
        TileChunk::new()
    }

    fn read_region(
        &self,
        coord: RegionCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<TileRegion> {
        read_tile_region(coord, reader)
    }

    fn write_region(&self, region: &TileRegion, writer: &mut ByteWriter) {
        write_tile_region(region, writer);
    }

    fn read_context(&self, reader: &mut ByteReader<'_>) -> StorageResult<ColorPalette> {
        let count = reader.read_u16()?;
        let mut palette = ColorPalette::new();
        for _ in 0..count {
            let argb = reader.read_u32()?;
            if palette.intern(argb).is_none() {
                return Err(StorageError::Corrupt("palette overflow".to_string()));
            }
        }
        if palette.len() != count as usize {
            return Err(StorageError::Corrupt("duplicate palette color".to_string()));
        }
        Ok(palette)
    }

    fn write_context(&self, context: &ColorPalette, writer: &mut ByteWriter) {
        // `intern` never lets the palette reach PALETTE_ESCAPE entries.
        writer.write_u16(context.colors.len() as u16);
        for &argb in &context.colors {
            writer.write_u32(argb);
        }
    }

    fn read_chunk(
        &self,
        _region: &TileRegion,
        context: &ColorPalette,
        coord: ChunkCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<TileChunk> {
        let mut chunk = TileChunk::new();
        for sample in chunk.samples.iter_mut() {
            let index = reader.read_u16()?;
            let argb = if index == PALETTE_ESCAPE {
                reader.read_u32()?
            } else {
                context.color(index).ok_or_else(|| {
                    StorageError::Corrupt(format!(
                        "chunk ({}, {}) references palette entry {index} of {}",
                        coord.x,
                        coord.z,
                        context.len()
                    ))
                })?
            };
            sample.argb = argb;
            sample.height = reader.read_i16()?;
            sample.light = reader.read_u8()?;
            sample.flags = reader.read_u8()?;
        }
        Ok(chunk)
    }

    fn write_chunk(
        &self,
        _region: &TileRegion,
        context: &mut ColorPalette,
        chunk: &TileChunk,
        writer: &mut ByteWriter,
    ) {
        for sample in chunk.samples() {
            match context.intern(sample.argb) {
                Some(index) => writer.write_u16(index),
                None => {
                    writer.write_u16(PALETTE_ESCAPE);
                    writer.write_u32(sample.argb);
                }
            }
            writer.write_i16(sample.height);
            writer.write_u8(sample.light);
            writer.write_u8(sample.flags);
        }
    }
}
