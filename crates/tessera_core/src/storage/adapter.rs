//! # Storage Adapter Contract
//!
//! A storage adapter is a capability object describing how one kind of tile
//! data is materialized from, and written back to, persisted bytes.
//!
//! ## Associated Types
//!
//! - `Region`: region-level payload, decoded once when the region loads
//! - `Chunk`: per-chunk payload, decoded lazily on first access
//! - `Context`: decode state shared by every chunk of one region (for
//!   example a color palette). Encoding fills it while chunks are written;
//!   it is persisted after the chunk bodies are produced but stored ahead of
//!   them, so decoding sees the complete context before any chunk.

use crate::coord::{ChunkCoord, RegionCoord};
use crate::error::StorageResult;
use crate::storage::bytes::{ByteReader, ByteWriter};

/// Serializer/deserializer for one kind of region/chunk data.
///
/// Implementations must satisfy the round-trip law: writing a region and
/// its chunks, then reading them back at the same coordinates, yields an
/// observably equal region.
pub trait StorageAdapter: Send + Sync + 'static {
    /// Region-level payload.
    type Region: Send + Sync + 'static;
    /// Chunk payload. Cloned only when an edit races a reader (copy-on-write).
    type Chunk: Clone + Send + Sync + 'static;
    /// Decode context shared by the chunks of one region.
    type Context: Default + Send + Sync + 'static;

    /// Stable adapter name, written into every region header.
    const NAME: &'static str;

    /// Region payload for coordinates with no persisted data.
    fn new_region(&self, coord: RegionCoord) -> Self::Region;

    /// Chunk payload for a slot with no persisted data.
    fn new_chunk(&self, region: &Self::Region, coord: ChunkCoord) -> Self::Chunk;

    /// Decodes the region payload.
    ///
    /// # Errors
    ///
    /// Returns a data error if the bytes are malformed.
    fn read_region(
        &self,
        coord: RegionCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<Self::Region>;

    /// Encodes the region payload.
    fn write_region(&self, region: &Self::Region, writer: &mut ByteWriter);

    /// Decodes the shared chunk context.
    ///
    /// # Errors
    ///
    /// Returns a data error if the bytes are malformed.
    fn read_context(&self, reader: &mut ByteReader<'_>) -> StorageResult<Self::Context>;

    /// Encodes the shared chunk context after every chunk has been written.
    fn write_context(&self, context: &Self::Context, writer: &mut ByteWriter);

    /// Decodes one chunk using the region's shared context.
    ///
    /// # Errors
    ///
    /// Returns a data error if the bytes are malformed.
    fn read_chunk(
        &self,
        region: &Self::Region,
        context: &Self::Context,
        coord: ChunkCoord,
        reader: &mut ByteReader<'_>,
    ) -> StorageResult<Self::Chunk>;

    /// Encodes one chunk, recording anything it shares in `context`.
    fn write_chunk(
        &self,
        region: &Self::Region,
        context: &mut Self::Context,
        chunk: &Self::Chunk,
        writer: &mut ByteWriter,
    );
}
