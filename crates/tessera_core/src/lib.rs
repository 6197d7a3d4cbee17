//! # TESSERA Core
//!
//! Persistent two-level spatial index of map tile data (world → region →
//! chunk), backed by pluggable storage adapters.
//!
//! ## Design Principles
//!
//! 1. **Pluggable**: tile data kinds register a [`StorageAdapter`] and get a
//!    typed [`StorageKey`] back; every load/save is routed through it
//! 2. **Lazy**: regions load on first reference, chunks decode on first access
//! 3. **Tolerant**: corrupt region bytes become an empty region plus a
//!    recorded [`Diagnostic`], never a crash
//! 4. **Safe eviction**: a leased region is never evicted, a dirty region is
//!    never dropped without a successful save
//!
//! ## Core Components
//!
//! - `StorageRegistry`: explicit adapter registry owned by the host session
//! - `MapCache`: resident regions per world, eviction, persistence
//! - `MapRegion`: 32x32 chunk slots, dirty flag, last access tick
//! - `PersistenceWorker`: background materialization and eviction sweeps
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{CacheConfig, MapCache, MemoryStore, RawTileAdapter, StorageRegistry,
//!     TickClock, WorldId, RegionCoord, ChunkSlot};
//!
//! let registry = Arc::new(StorageRegistry::new());
//! let key = registry.register(RawTileAdapter)?;
//! registry.seal();
//!
//! let cache = MapCache::new(registry, Arc::new(MemoryStore::new()),
//!     Arc::new(TickClock::new()), CacheConfig::default());
//! cache.bind_world(WorldId(0), key)?;
//!
//! let region = cache.get_region(WorldId(0), RegionCoord::new(0, 0))?;
//! let chunk = cache.get_chunk(&region, ChunkSlot::new(3, 4), true);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod coord;
pub mod error;
pub mod storage;

pub use cache::{
    CacheStats, Diagnostic, EvictionReport, MapCache, MapRegion, PersistenceWorker, RegionLease,
};
pub use clock::TickClock;
pub use config::{CacheConfig, SaveRetryConfig, WorkerConfig};
pub use coord::{
    ChunkCoord, ChunkSlot, RegionCoord, WorldId, CHUNK_BLOCKS, CHUNK_COLUMNS, CHUNK_SLOTS,
    REGION_BLOCKS, REGION_CHUNKS,
};
pub use error::{StorageError, StorageResult};
pub use storage::{
    ByteReader, ByteWriter, ColorPalette, ColumnSample, ColumnSamples, DirectoryStore,
    MemoryStore, PaletteTileAdapter, RawTileAdapter, RegionStore, StorageAdapter, StorageKey,
    StorageRegistry, TileChunk, TileRegion,
};
