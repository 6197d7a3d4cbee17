//! # Region Codec
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "TSRG"]
//! [4 bytes: CRC32 of the compressed body]
//! [N bytes: LZ4 block, uncompressed size prepended]
//!
//! Body:
//! [u16 len + utf-8: adapter name]
//! [i32: region x] [i32: region z]
//! [u32 len + bytes: adapter region payload]
//! [u32 len + bytes: adapter chunk context]
//! [u16: chunk count]
//! Chunk entry:
//! [u16: slot index] [u32 len + bytes: adapter chunk body]
//! ```
//!
//! Chunk bodies are not decoded with the region: they stay as blobs until
//! the chunk is first accessed.

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::coord::{ChunkCoord, ChunkSlot, RegionCoord, CHUNK_SLOTS};
use crate::error::{StorageError, StorageResult};
use crate::storage::adapter::StorageAdapter;
use crate::storage::bytes::{ByteReader, ByteWriter};

/// Magic bytes identifying a region file.
const REGION_MAGIC: &[u8; 4] = b"TSRG";

/// Largest accepted uncompressed body.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// A region whose chunks are still encoded.
pub(crate) struct DecodedRegion<A: StorageAdapter> {
    pub payload: A::Region,
    pub context: A::Context,
    pub pending: Vec<(ChunkSlot, Vec<u8>)>,
}

/// Encodes a region and the given resident chunks.
pub(crate) fn encode_region<'a, A, I>(
    adapter: &A,
    coord: RegionCoord,
    payload: &A::Region,
    chunks: I,
) -> Vec<u8>
where
    A: StorageAdapter,
    I: IntoIterator<Item = (ChunkSlot, &'a A::Chunk)>,
{
    let mut context = A::Context::default();
    let mut table = ByteWriter::new();
    let mut scratch = ByteWriter::new();
    let mut count: u16 = 0;

    for (slot, chunk) in chunks {
        scratch.clear();
        adapter.write_chunk(payload, &mut context, chunk, &mut scratch);
        table.write_u16(slot.index() as u16);
        table.write_blob(scratch.as_slice());
        count += 1;
    }

    let mut body = ByteWriter::with_capacity(table.len() + 256);
    body.write_str(A::NAME);
    body.write_i32(coord.x);
    body.write_i32(coord.z);

    scratch.clear();
    adapter.write_region(payload, &mut scratch);
    body.write_blob(scratch.as_slice());

    scratch.clear();
    adapter.write_context(&context, &mut scratch);
    body.write_blob(scratch.as_slice());

    body.write_u16(count);
    body.write_bytes(table.as_slice());

    let compressed = compress_prepend_size(body.as_slice());
    let mut out = Vec::with_capacity(compressed.len() + 8);
    out.extend_from_slice(REGION_MAGIC);
    out.extend_from_slice(&crc32fast::hash(&compressed).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

/// Decodes a region header, payload and context, leaving chunks encoded.
///
/// # Errors
///
/// Returns a data error on bad framing, CRC mismatch, LZ4 failure, a
/// header naming another adapter or other coordinates, or malformed
/// adapter sections.
pub(crate) fn decode_region<A: StorageAdapter>(
    adapter: &A,
    coord: RegionCoord,
    bytes: &[u8],
) -> StorageResult<DecodedRegion<A>> {
    let mut outer = ByteReader::new(bytes);
    if outer.read_bytes(4)? != REGION_MAGIC {
        return Err(StorageError::Corrupt("bad region magic".to_string()));
    }
    let stored_crc = outer.read_u32()?;
    let compressed = outer.read_bytes(outer.remaining())?;
    if crc32fast::hash(compressed) != stored_crc {
        return Err(StorageError::Corrupt("region checksum mismatch".to_string()));
    }

    let declared = ByteReader::new(compressed).read_u32()? as usize;
    if declared > MAX_BODY_BYTES {
        return Err(StorageError::Corrupt(format!(
            "region body of {declared} bytes exceeds limit"
        )));
    }
    let body = decompress_size_prepended(compressed)
        .map_err(|e| StorageError::Corrupt(format!("lz4: {e}")))?;

    let mut reader = ByteReader::new(&body);
    let name = reader.read_str()?;
    if name != A::NAME {
        return Err(StorageError::AdapterMismatch {
            expected: A::NAME,
            found: name.to_string(),
        });
    }
    let stored = RegionCoord::new(reader.read_i32()?, reader.read_i32()?);
    if stored != coord {
        return Err(StorageError::Corrupt(format!(
            "region header is for {stored}, loaded as {coord}"
        )));
    }

    let payload = adapter.read_region(coord, &mut ByteReader::new(reader.read_blob()?))?;
    let context = adapter.read_context(&mut ByteReader::new(reader.read_blob()?))?;

    let count = reader.read_u16()? as usize;
    if count > CHUNK_SLOTS {
        return Err(StorageError::Corrupt(format!("{count} chunks in one region")));
    }
    let mut pending = Vec::with_capacity(count);
    for _ in 0..count {
        let index = reader.read_u16()? as usize;
        if index >= CHUNK_SLOTS {
            return Err(StorageError::Corrupt(format!("chunk slot {index} out of range")));
        }
        pending.push((ChunkSlot::from_index(index), reader.read_blob()?.to_vec()));
    }
    if !reader.is_exhausted() {
        return Err(StorageError::Corrupt(format!(
            "{} trailing bytes after chunk table",
            reader.remaining()
        )));
    }

    Ok(DecodedRegion {
        payload,
        context,
        pending,
    })
}

/// Decodes one chunk blob produced by `encode_region`.
///
/// # Errors
///
/// Returns a data error if the adapter rejects the blob or leaves bytes unread.
pub(crate) fn decode_chunk<A: StorageAdapter>(
    adapter: &A,
    payload: &A::Region,
    context: &A::Context,
    coord: ChunkCoord,
    blob: &[u8],
) -> StorageResult<A::Chunk> {
    let mut reader = ByteReader::new(blob);
    let chunk = adapter.read_chunk(payload, context, coord, &mut reader)?;
    if !reader.is_exhausted() {
        return Err(StorageError::Corrupt(format!(
            "chunk ({}, {}) has {} trailing bytes",
            coord.x,
            coord.z,
            reader.remaining()
        )));
    }
    Ok(chunk)
}
