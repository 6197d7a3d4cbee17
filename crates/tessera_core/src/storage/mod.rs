//! # Storage
//!
//! Everything between a resident region and its persisted bytes.
//!
//! ```text
//!   StorageRegistry ──register(adapter)──► StorageKey<A>
//!                                              │
//!   MapCache ──key──► Arc<A: StorageAdapter> ──┤
//!                                              ▼
//!                       codec (header, context, chunk table, LZ4 + CRC32)
//!                                              │
//!                                              ▼
//!                         RegionStore (DirectoryStore / MemoryStore)
//! ```

mod adapter;
mod bytes;
pub(crate) mod codec;
mod registry;
mod store;
mod tile;

pub use adapter::StorageAdapter;
pub use bytes::{ByteReader, ByteWriter};
pub use registry::{StorageKey, StorageRegistry};
pub use store::{DirectoryStore, MemoryStore, RegionStore};
pub use tile::{
    ColorPalette, ColumnSample, ColumnSamples, PaletteTileAdapter, RawTileAdapter, TileChunk,
    TileRegion,
};
