//! # Region/Chunk Cache
//!
//! Owns the resident regions of every world, loads them on demand through
//! the adapter bound to the world, and evicts them once unreferenced.
//!
//! ## Guarantees
//!
//! 1. **Visibility**: a chunk is published into its slot under the region
//!    lock, so a `get_chunk` that sees it sees it fully decoded
//! 2. **No eviction mid-read**: leased regions are skipped by every sweep
//! 3. **No silent loss**: a dirty region is only removed after a successful
//!    save; edits racing the save re-dirty it and defer removal
//! 4. **Corruption tolerance**: undecodable bytes load as an empty region
//!    and leave a `Diagnostic` behind
//!
//! ## Locking
//!
//! ```text
//!   regions map (RwLock) ──► Arc<MapRegion> ──► slot table (RwLock)
//! ```
//!
//! Leases are taken while the map lock is held, and eviction re-checks the
//! reader count under the map write lock, so no lease can be handed out for
//! a region that is being removed.

mod region;
mod worker;

pub use region::{MapRegion, RegionLease};
pub use worker::PersistenceWorker;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::clock::TickClock;
use crate::config::CacheConfig;
use crate::coord::{ChunkCoord, ChunkSlot, RegionCoord, WorldId};
use crate::error::{StorageError, StorageResult};
use crate::storage::codec;
use crate::storage::{RegionStore, StorageAdapter, StorageKey, StorageRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct RegionKey {
    world: WorldId,
    coord: RegionCoord,
}

/// How a missed region came to be.
enum LoadOutcome {
    Created,
    Loaded { chunks: usize },
    Corrupt(StorageError),
}

struct WorldBinding<A> {
    key: StorageKey<A>,
    adapter: Arc<A>,
}

/// A recorded load problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// World of the affected region.
    pub world: WorldId,
    /// Affected region.
    pub region: RegionCoord,
    /// Affected chunk, if the problem was chunk-level.
    pub slot: Option<ChunkSlot>,
    /// Tick at which it was recorded.
    pub tick: u64,
    /// Error description.
    pub message: String,
}

/// Outcome of one eviction sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Regions removed from memory.
    pub evicted: usize,
    /// Regions kept because their save failed.
    pub deferred: usize,
    /// Candidates that were leased, re-dirtied or still saving at removal.
    pub skipped: usize,
}

/// Cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Regions currently resident.
    pub resident_regions: usize,
    /// Regions decoded from storage.
    pub loads: u64,
    /// Regions created empty (nothing persisted).
    pub creates: u64,
    /// Loads that fell back to an empty region.
    pub corrupt_loads: u64,
    /// Regions evicted.
    pub evictions: u64,
    /// Successful region saves.
    pub saves: u64,
    /// Save attempts that were retried.
    pub save_retries: u64,
    /// Evictions deferred by save failures.
    pub deferred_evictions: u64,
}

#[derive(Default)]
struct Counters {
    loads: AtomicU64,
    creates: AtomicU64,
    corrupt_loads: AtomicU64,
    evictions: AtomicU64,
    saves: AtomicU64,
    save_retries: AtomicU64,
    deferred_evictions: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Region/chunk cache for one adapter type.
pub struct MapCache<A: StorageAdapter> {
    registry: Arc<StorageRegistry>,
    store: Arc<dyn RegionStore>,
    clock: Arc<TickClock>,
    config: CacheConfig,
    worlds: RwLock<HashMap<WorldId, WorldBinding<A>>>,
    regions: RwLock<HashMap<RegionKey, Arc<MapRegion<A>>>>,
    diagnostics: Mutex<VecDeque<Diagnostic>>,
    counters: Counters,
}

impl<A: StorageAdapter> MapCache<A> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(
        registry: Arc<StorageRegistry>,
        store: Arc<dyn RegionStore>,
        clock: Arc<TickClock>,
        config: CacheConfig,
    ) -> Self {
        Self {
            registry,
            store,
            clock,
            diagnostics: Mutex::new(VecDeque::with_capacity(config.diagnostics_capacity)),
            config,
            worlds: RwLock::new(HashMap::new()),
            regions: RwLock::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Shared tick clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<TickClock> {
        &self.clock
    }

    /// Registry keys are resolved against.
    #[must_use]
    pub fn registry(&self) -> &Arc<StorageRegistry> {
        &self.registry
    }

    /// Routes a world's regions through the adapter behind `key`.
    ///
    /// Regions already resident keep the adapter they were loaded with.
    ///
    /// # Errors
    ///
    /// Returns `KeyMismatch` if `key` was not issued by this cache's registry.
    pub fn bind_world(&self, world: WorldId, key: StorageKey<A>) -> StorageResult<()> {
        let adapter = self.registry.adapter(&key)?;
        self.worlds.write().insert(world, WorldBinding { key, adapter });
        tracing::debug!(%world, adapter = A::NAME, key = key.index(), "bound world");
        Ok(())
    }

    /// Key bound to `world`, if any.
    #[must_use]
    pub fn world_key(&self, world: WorldId) -> Option<StorageKey<A>> {
        self.worlds.read().get(&world).map(|b| b.key)
    }

    fn adapter_for(&self, world: WorldId) -> StorageResult<Arc<A>> {
        self.worlds
            .read()
            .get(&world)
            .map(|b| Arc::clone(&b.adapter))
            .ok_or(StorageError::UnboundWorld(world))
    }

    /// Returns the region, loading or creating it on miss.
    ///
    /// Undecodable persisted bytes yield an empty region and a diagnostic.
    ///
    /// # Errors
    ///
    /// Returns `UnboundWorld` if no key is bound to `world`, or `Io` if the
    /// store cannot be read. Read failures are not treated as "empty" since
    /// a later save would overwrite data that may still be intact.
    pub fn get_region(&self, world: WorldId, coord: RegionCoord) -> StorageResult<RegionLease<A>> {
        if let Some(lease) = self.peek_region(world, coord) {
            return Ok(lease);
        }

        let adapter = self.adapter_for(world)?;
        let now = self.clock.now();
        let (region, outcome) = match self.store.load(world, A::NAME, coord)? {
            None => (MapRegion::empty(adapter, world, coord, now), LoadOutcome::Created),
            Some(bytes) => match codec::decode_region(&*adapter, coord, &bytes) {
                Ok(decoded) => {
                    let chunks = decoded.pending.len();
                    let region = MapRegion::from_decoded(adapter, world, coord, decoded, now);
                    (region, LoadOutcome::Loaded { chunks })
                }
                Err(e) => (
                    MapRegion::empty(adapter, world, coord, now),
                    LoadOutcome::Corrupt(e),
                ),
            },
        };

        // A racing miss may have inserted first; only the winner counts.
        let (lease, inserted) = {
            let mut regions = self.regions.write();
            let (region, inserted) = match regions.entry(RegionKey { world, coord }) {
                Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
                Entry::Vacant(entry) => (Arc::clone(entry.insert(Arc::new(region))), true),
            };
            (RegionLease::new(region, Arc::clone(&self.clock)), inserted)
        };
        if inserted {
            self.note_load(world, coord, outcome);
        }
        Ok(lease)
    }

    fn note_load(&self, world: WorldId, coord: RegionCoord, outcome: LoadOutcome) {
        match outcome {
            LoadOutcome::Created => {
                Counters::bump(&self.counters.creates);
                tracing::debug!(
                    %world,
                    region_x = coord.x,
                    region_z = coord.z,
                    "created empty region"
                );
            }
            LoadOutcome::Loaded { chunks } => {
                Counters::bump(&self.counters.loads);
                tracing::debug!(
                    %world,
                    region_x = coord.x,
                    region_z = coord.z,
                    chunks,
                    "loaded region"
                );
            }
            LoadOutcome::Corrupt(e) => {
                Counters::bump(&self.counters.corrupt_loads);
                self.record(world, coord, None, &e);
            }
        }
    }

    /// Returns the region only if it is already resident.
    #[must_use]
    pub fn peek_region(&self, world: WorldId, coord: RegionCoord) -> Option<RegionLease<A>> {
        let regions = self.regions.read();
        regions
            .get(&RegionKey { world, coord })
            .map(|region| RegionLease::new(Arc::clone(region), Arc::clone(&self.clock)))
    }

    /// Returns true if the region is resident.
    #[must_use]
    pub fn is_resident(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.regions.read().contains_key(&RegionKey { world, coord })
    }

    /// Number of resident regions.
    #[must_use]
    pub fn resident_regions(&self) -> usize {
        self.regions.read().len()
    }

    /// Chunk at `slot` of a leased region.
    ///
    /// With `create_if_absent == false` only resident chunks are returned:
    /// `None` means "not available yet", not an error. Otherwise the chunk
    /// is decoded from its blob or created empty.
    #[must_use]
    pub fn get_chunk(
        &self,
        region: &MapRegion<A>,
        slot: ChunkSlot,
        create_if_absent: bool,
    ) -> Option<Arc<A::Chunk>> {
        region.touch(self.clock.now());
        if !create_if_absent {
            return region.chunk(slot);
        }

        let (chunk, error) = region.chunk_or_create(slot);
        if let Some(e) = error {
            self.record(region.world(), region.coord(), Some(slot), &e);
        }
        Some(chunk)
    }

    /// Resident chunk at world chunk coordinates, without loading anything.
    #[must_use]
    pub fn chunk_at(&self, world: WorldId, chunk: ChunkCoord) -> Option<Arc<A::Chunk>> {
        let region = self.peek_region(world, chunk.region())?;
        self.get_chunk(&region, chunk.slot(), false)
    }

    /// Edits a chunk, loading its region and creating it if needed.
    ///
    /// The region is marked dirty. Readers holding the previous chunk keep
    /// an unchanged snapshot. `edit` may read the cache, including the chunk
    /// being edited, but must not call `edit_chunk` on the same region:
    /// edits of one region are serialized and that call deadlocks.
    ///
    /// # Errors
    ///
    /// Fails like `get_region`.
    pub fn edit_chunk<R>(
        &self,
        world: WorldId,
        chunk: ChunkCoord,
        edit: impl FnOnce(&mut A::Chunk) -> R,
    ) -> StorageResult<R> {
        let region = self.get_region(world, chunk.region())?;
        let (result, error) = region.edit_chunk(chunk.slot(), edit);
        if let Some(e) = error {
            self.record(world, region.coord(), Some(chunk.slot()), &e);
        }
        Ok(result)
    }

    /// Drops one chunk from a resident region. The removal is persisted on
    /// the next save.
    pub fn invalidate_chunk(&self, world: WorldId, chunk: ChunkCoord) -> bool {
        self.peek_region(world, chunk.region())
            .is_some_and(|region| region.invalidate_chunk(chunk.slot()))
    }

    /// Drops a region from memory without saving it.
    ///
    /// Readers holding leases keep their snapshot; unsaved edits are lost.
    pub fn invalidate_region(&self, world: WorldId, coord: RegionCoord) -> bool {
        let removed = self.regions.write().remove(&RegionKey { world, coord }).is_some();
        if removed {
            tracing::debug!(%world, region_x = coord.x, region_z = coord.z, "invalidated region");
        }
        removed
    }

    /// Loads a region and decodes all of its pending chunks.
    ///
    /// Meant for the background path, so render passes find chunks resident.
    ///
    /// # Errors
    ///
    /// Fails like `get_region`.
    pub fn materialize(&self, world: WorldId, coord: RegionCoord) -> StorageResult<usize> {
        let region = self.get_region(world, coord)?;
        let (decoded, failures) = region.materialize_pending();
        for (slot, e) in failures {
            self.record(world, coord, Some(slot), &e);
        }
        Ok(decoded)
    }

    /// Saves a region if it is dirty, retrying with backoff.
    ///
    /// # Errors
    ///
    /// Returns the last store error once retries are exhausted. The region
    /// stays dirty in that case.
    pub fn save_region(&self, region: &MapRegion<A>) -> StorageResult<()> {
        let _saving = region.lock_save();
        if !region.take_dirty() {
            return Ok(());
        }

        let (bytes, failures) = region.encode();
        for (slot, e) in failures {
            self.record(region.world(), region.coord(), Some(slot), &e);
        }

        let retry = &self.config.save_retry;
        let mut attempt = 1;
        loop {
            match self.store.save(region.world(), A::NAME, region.coord(), &bytes) {
                Ok(()) => {
                    Counters::bump(&self.counters.saves);
                    tracing::debug!(
                        world = %region.world(),
                        region_x = region.coord().x,
                        region_z = region.coord().z,
                        bytes = bytes.len(),
                        "saved region"
                    );
                    return Ok(());
                }
                Err(e) if attempt < retry.max_attempts => {
                    Counters::bump(&self.counters.save_retries);
                    tracing::warn!(
                        world = %region.world(),
                        region_x = region.coord().x,
                        region_z = region.coord().z,
                        attempt,
                        error = %e,
                        "region save failed, retrying"
                    );
                    std::thread::sleep(retry.backoff(attempt));
                    attempt += 1;
                }
                Err(e) => {
                    region.mark_dirty();
                    tracing::error!(
                        world = %region.world(),
                        region_x = region.coord().x,
                        region_z = region.coord().z,
                        attempts = attempt,
                        error = %e,
                        "region save failed, keeping region dirty"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Saves every dirty region. Returns the number saved.
    ///
    /// # Errors
    ///
    /// Every dirty region is attempted; the first failure is returned.
    pub fn flush_all(&self) -> StorageResult<usize> {
        let dirty: Vec<Arc<MapRegion<A>>> = self
            .regions
            .read()
            .values()
            .filter(|r| r.is_dirty())
            .cloned()
            .collect();

        let mut saved = 0;
        let mut first_error = None;
        for region in dirty {
            match self.save_region(&region) {
                Ok(()) => saved += 1,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(saved), Err)
    }

    /// Evicts unleased regions idle for the retention window, plus the
    /// oldest unleased regions while over `max_resident_regions`.
    ///
    /// Dirty regions are saved first; a failed save defers their eviction.
    /// A region another thread is still saving is skipped.
    pub fn evict_expired(&self) -> EvictionReport {
        let now = self.clock.now();
        let retention = self.config.retention_ticks;

        let candidates: Vec<Arc<MapRegion<A>>> = {
            let regions = self.regions.read();
            let over_cap = regions.len().saturating_sub(self.config.max_resident_regions);
            let mut idle: Vec<Arc<MapRegion<A>>> = regions
                .values()
                .filter(|r| r.readers() == 0)
                .cloned()
                .collect();
            idle.sort_by_key(|r| r.last_access());
            idle.into_iter()
                .enumerate()
                .filter(|(rank, r)| {
                    *rank < over_cap || now.saturating_sub(r.last_access()) >= retention
                })
                .map(|(_, r)| r)
                .collect()
        };

        let mut report = EvictionReport::default();
        for region in candidates {
            if region.is_dirty() && self.save_region(&region).is_err() {
                Counters::bump(&self.counters.deferred_evictions);
                report.deferred += 1;
                continue;
            }

            let key = RegionKey {
                world: region.world(),
                coord: region.coord(),
            };
            let mut regions = self.regions.write();
            let same = regions.get(&key).is_some_and(|r| Arc::ptr_eq(r, &region));
            if same && region.readers() == 0 && !region.is_dirty() && !region.is_saving() {
                regions.remove(&key);
                Counters::bump(&self.counters.evictions);
                report.evicted += 1;
                tracing::debug!(
                    world = %key.world,
                    region_x = key.coord.x,
                    region_z = key.coord.z,
                    idle_ticks = now.saturating_sub(region.last_access()),
                    "evicted region"
                );
            } else {
                report.skipped += 1;
            }
        }
        report
    }

    fn record(
        &self,
        world: WorldId,
        region: RegionCoord,
        slot: Option<ChunkSlot>,
        error: &StorageError,
    ) {
        tracing::warn!(
            %world,
            region_x = region.x,
            region_z = region.z,
            slot = slot.map(ChunkSlot::index),
            error = %error,
            "unreadable tile data treated as empty"
        );

        let mut diagnostics = self.diagnostics.lock();
        if diagnostics.len() >= self.config.diagnostics_capacity {
            diagnostics.pop_front();
        }
        diagnostics.push_back(Diagnostic {
            world,
            region,
            slot,
            tick: self.clock.now(),
            message: error.to_string(),
        });
    }

    /// Recorded diagnostics, oldest first.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().iter().cloned().collect()
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            resident_regions: self.resident_regions(),
            loads: c.loads.load(Ordering::Relaxed),
            creates: c.creates.load(Ordering::Relaxed),
            corrupt_loads: c.corrupt_loads.load(Ordering::Relaxed),
            evictions: c.evictions.load(Ordering::Relaxed),
            saves: c.saves.load(Ordering::Relaxed),
            save_retries: c.save_retries.load(Ordering::Relaxed),
            deferred_evictions: c.deferred_evictions.load(Ordering::Relaxed),
        }
    }
}

impl<A: StorageAdapter> fmt::Debug for MapCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapCache")
            .field("adapter", &A::NAME)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SaveRetryConfig;
    use crate::storage::{ColumnSample, MemoryStore, RawTileAdapter};

    const WORLD: WorldId = WorldId(0);

    struct Fixture {
        cache: MapCache<RawTileAdapter>,
        store: Arc<MemoryStore>,
        clock: Arc<TickClock>,
    }

    fn fixture(config: CacheConfig) -> Fixture {
        let registry = Arc::new(StorageRegistry::new());
        let key = registry.register(RawTileAdapter).unwrap();
        registry.seal();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(TickClock::new());
        let cache = MapCache::new(registry, store.clone(), Arc::clone(&clock), config);
        cache.bind_world(WORLD, key).unwrap();
        Fixture { cache, store, clock }
    }

    fn quick_config() -> CacheConfig {
        CacheConfig {
            retention_ticks: 10,
            save_retry: SaveRetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
            ..CacheConfig::default()
        }
    }

    fn paint(cache: &MapCache<RawTileAdapter>, chunk: ChunkCoord, argb: u32) {
        cache
            .edit_chunk(WORLD, chunk, |c| c.set_sample(0, 0, ColumnSample::new(argb, 64, 15)))
            .unwrap();
    }

    #[test]
    fn test_unbound_world() {
        let f = fixture(quick_config());
        let err = f.cache.get_region(WorldId(9), RegionCoord::new(0, 0)).unwrap_err();
        assert!(matches!(err, StorageError::UnboundWorld(WorldId(9))));
    }

    #[test]
    fn test_get_region_creates_once() {
        let f = fixture(quick_config());
        let a = f.cache.get_region(WORLD, RegionCoord::new(1, 1)).unwrap();
        let b = f.cache.get_region(WORLD, RegionCoord::new(1, 1)).unwrap();
        assert!(Arc::ptr_eq(a.region(), b.region()));
        assert_eq!(f.cache.stats().creates, 1);
        assert_eq!(a.readers(), 2);
    }

    #[test]
    fn test_get_chunk_without_create() {
        let f = fixture(quick_config());
        let region = f.cache.get_region(WORLD, RegionCoord::new(0, 0)).unwrap();
        let slot = ChunkSlot::new(2, 2);
        assert!(f.cache.get_chunk(&region, slot, false).is_none());
        assert!(f.cache.get_chunk(&region, slot, true).is_some());
        assert!(f.cache.get_chunk(&region, slot, false).is_some());
    }

    #[test]
    fn test_eviction_saves_dirty_region() {
        let f = fixture(quick_config());
        paint(&f.cache, ChunkCoord::new(3, 4), 0xFFAA_BBCC);

        f.clock.advance(10);
        let report = f.cache.evict_expired();
        assert_eq!(report.evicted, 1);
        assert!(f.store.contains(WORLD, "raw_tiles", RegionCoord::new(0, 0)));

        let region = f.cache.get_region(WORLD, RegionCoord::new(0, 0)).unwrap();
        assert!(region.is_pending(ChunkSlot::new(3, 4)));
        let chunk = f.cache.get_chunk(&region, ChunkSlot::new(3, 4), true).unwrap();
        assert_eq!(chunk.sample(0, 0).argb, 0xFFAA_BBCC);
    }

    #[test]
    fn test_leased_region_not_evicted() {
        let f = fixture(quick_config());
        let lease = f.cache.get_region(WORLD, RegionCoord::new(0, 0)).unwrap();
        f.clock.advance(100);
        assert_eq!(f.cache.evict_expired().evicted, 0);
        assert!(f.cache.is_resident(WORLD, RegionCoord::new(0, 0)));

        drop(lease);
        // Retention restarts when the last lease is dropped.
        assert_eq!(f.cache.evict_expired().evicted, 0);
        f.clock.advance(10);
        assert_eq!(f.cache.evict_expired().evicted, 1);
    }

    #[test]
    fn test_failed_save_defers_eviction() {
        let f = fixture(quick_config());
        paint(&f.cache, ChunkCoord::new(0, 0), 0xFF00_0001);
        f.store.fail_next_saves(3);
        f.clock.advance(10);

        let report = f.cache.evict_expired();
        assert_eq!(report.deferred, 1);
        assert_eq!(f.store.save_calls(), 3);
        assert!(f.cache.is_resident(WORLD, RegionCoord::new(0, 0)));
        assert_eq!(f.cache.stats().save_retries, 2);

        let report = f.cache.evict_expired();
        assert_eq!(report.evicted, 1);
        assert!(f.store.contains(WORLD, "raw_tiles", RegionCoord::new(0, 0)));
    }

    #[test]
    fn test_retry_recovers_within_bound() {
        let f = fixture(quick_config());
        paint(&f.cache, ChunkCoord::new(0, 0), 0xFF00_0002);
        f.store.fail_next_saves(2);

        assert_eq!(f.cache.flush_all().unwrap(), 1);
        assert_eq!(f.store.save_calls(), 3);
    }

    #[test]
    fn test_corrupt_region_loads_empty() {
        let f = fixture(quick_config());
        f.store
            .insert_raw(WORLD, "raw_tiles", RegionCoord::new(5, 5), b"not a region".to_vec());

        let region = f.cache.get_region(WORLD, RegionCoord::new(5, 5)).unwrap();
        assert_eq!(region.occupied_slots().len(), 0);
        assert_eq!(f.cache.stats().corrupt_loads, 1);

        let diagnostics = f.cache.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].region, RegionCoord::new(5, 5));
        assert!(diagnostics[0].slot.is_none());
    }

    #[test]
    fn test_region_being_saved_is_not_evicted() {
        let f = fixture(quick_config());
        paint(&f.cache, ChunkCoord::new(0, 0), 0xFF00_00AA);
        f.cache.flush_all().unwrap();
        let region = Arc::clone(f.cache.regions.read().values().next().unwrap());

        f.clock.advance(10);
        let saving = region.lock_save();
        assert!(region.is_saving());
        let report = f.cache.evict_expired();
        assert_eq!(report.evicted, 0);
        assert_eq!(report.skipped, 1);
        assert!(f.cache.is_resident(WORLD, RegionCoord::new(0, 0)));

        drop(saving);
        assert_eq!(f.cache.evict_expired().evicted, 1);
    }

    #[test]
    fn test_racing_loads_count_once() {
        let f = fixture(quick_config());
        f.store
            .insert_raw(WORLD, "raw_tiles", RegionCoord::new(2, 2), b"garbage".to_vec());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let region = f.cache.get_region(WORLD, RegionCoord::new(2, 2)).unwrap();
                    assert_eq!(region.resident_count(), 0);
                });
            }
        });

        let stats = f.cache.stats();
        assert_eq!(stats.corrupt_loads, 1);
        assert_eq!(stats.resident_regions, 1);
        assert_eq!(f.cache.diagnostics().len(), 1);
    }

    #[test]
    fn test_edit_can_read_its_own_region() {
        let f = fixture(quick_config());
        let chunk = ChunkCoord::new(4, 4);
        paint(&f.cache, chunk, 0xFF00_0001);

        let seen = f
            .cache
            .edit_chunk(WORLD, chunk, |c| {
                let before = f.cache.chunk_at(WORLD, chunk).unwrap().sample(0, 0).argb;
                let region = f.cache.get_region(WORLD, chunk.region()).unwrap();
                assert!(f.cache.get_chunk(&region, ChunkSlot::new(5, 4), true).is_some());
                c.set_sample(0, 0, ColumnSample::new(0xFF00_0002, 64, 15));
                before
            })
            .unwrap();

        assert_eq!(seen, 0xFF00_0001);
        let after = f.cache.chunk_at(WORLD, chunk).unwrap();
        assert_eq!(after.sample(0, 0).argb, 0xFF00_0002);
    }

    #[test]
    fn test_over_cap_evicts_oldest() {
        let f = fixture(CacheConfig {
            max_resident_regions: 2,
            retention_ticks: 1_000,
            ..quick_config()
        });
        for x in 0..3 {
            drop(f.cache.get_region(WORLD, RegionCoord::new(x, 0)).unwrap());
            f.clock.advance(1);
        }

        let report = f.cache.evict_expired();
        assert_eq!(report.evicted, 1);
        assert!(!f.cache.is_resident(WORLD, RegionCoord::new(0, 0)));
        assert!(f.cache.is_resident(WORLD, RegionCoord::new(2, 0)));
    }

    #[test]
    fn test_invalidate() {
        let f = fixture(quick_config());
        paint(&f.cache, ChunkCoord::new(1, 1), 0xFF00_0003);
        assert!(f.cache.invalidate_chunk(WORLD, ChunkCoord::new(1, 1)));
        assert!(f.cache.chunk_at(WORLD, ChunkCoord::new(1, 1)).is_none());

        assert!(f.cache.invalidate_region(WORLD, RegionCoord::new(0, 0)));
        assert!(!f.cache.is_resident(WORLD, RegionCoord::new(0, 0)));
        assert!(f.store.is_empty());
    }

    #[test]
    fn test_diagnostics_ring_is_bounded() {
        let f = fixture(CacheConfig {
            diagnostics_capacity: 2,
            ..quick_config()
        });
        for x in 0..4 {
            f.store
                .insert_raw(WORLD, "raw_tiles", RegionCoord::new(x, 0), vec![0; 3]);
            f.cache.get_region(WORLD, RegionCoord::new(x, 0)).unwrap();
        }
        let diagnostics = f.cache.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].region, RegionCoord::new(2, 0));
    }
}
