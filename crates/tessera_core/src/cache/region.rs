//! # Map Region
//!
//! One resident region: the adapter's region payload, 32x32 chunk slots and
//! the bookkeeping the cache needs for eviction.
//!
//! ## Chunk States
//!
//! ```text
//!   absent ──persisted──► pending (encoded blob) ──first access──► resident
//!      │                                                              ▲
//!      └────────────────── create on access ─────────────────────────┘
//! ```
//!
//! Resident chunks are `Arc`s. Readers keep the snapshot they were handed;
//! edits go through `Arc::make_mut`, so a chunk a reader still holds is
//! cloned instead of mutated in place.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockWriteGuard};

use crate::clock::TickClock;
use crate::coord::{ChunkSlot, RegionCoord, WorldId, CHUNK_SLOTS};
use crate::error::StorageError;
use crate::storage::codec::{self, DecodedRegion};
use crate::storage::StorageAdapter;

/// Chunk slots plus the decode context of their encoded blobs.
struct SlotTable<A: StorageAdapter> {
    context: A::Context,
    chunks: Box<[Option<Arc<A::Chunk>>]>,
    pending: HashMap<ChunkSlot, Vec<u8>>,
}

impl<A: StorageAdapter> SlotTable<A> {
    fn new(context: A::Context, pending: HashMap<ChunkSlot, Vec<u8>>) -> Self {
        let chunks: Vec<Option<Arc<A::Chunk>>> = (0..CHUNK_SLOTS).map(|_| None).collect();
        Self {
            context,
            chunks: chunks.into_boxed_slice(),
            pending,
        }
    }
}

/// Failures hit while decoding pending chunk blobs.
pub(crate) type ChunkFailures = Vec<(ChunkSlot, StorageError)>;

/// A resident region.
pub struct MapRegion<A: StorageAdapter> {
    world: WorldId,
    coord: RegionCoord,
    adapter: Arc<A>,
    payload: A::Region,
    slots: RwLock<SlotTable<A>>,
    /// Held by `save_region` from clearing the dirty flag until the store
    /// write finishes.
    save_guard: Mutex<()>,
    /// Serializes edits so the edit closure can run outside `slots`.
    edit_guard: Mutex<()>,
    dirty: AtomicBool,
    last_access: AtomicU64,
    readers: AtomicUsize,
}

impl<A: StorageAdapter> MapRegion<A> {
    /// Region with no persisted data.
    pub(crate) fn empty(adapter: Arc<A>, world: WorldId, coord: RegionCoord, now: u64) -> Self {
        let payload = adapter.new_region(coord);
        let slots = SlotTable::new(A::Context::default(), HashMap::new());
        Self::with_parts(adapter, world, coord, payload, slots, now)
    }

    /// Region decoded from storage; chunks stay encoded until accessed.
    pub(crate) fn from_decoded(
        adapter: Arc<A>,
        world: WorldId,
        coord: RegionCoord,
        decoded: DecodedRegion<A>,
        now: u64,
    ) -> Self {
        let pending = decoded.pending.into_iter().collect();
        Self::with_parts(
            adapter,
            world,
            coord,
            decoded.payload,
            SlotTable::new(decoded.context, pending),
            now,
        )
    }

    fn with_parts(
        adapter: Arc<A>,
        world: WorldId,
        coord: RegionCoord,
        payload: A::Region,
        slots: SlotTable<A>,
        now: u64,
    ) -> Self {
        Self {
            world,
            coord,
            adapter,
            payload,
            slots: RwLock::new(slots),
            save_guard: Mutex::new(()),
            edit_guard: Mutex::new(()),
            dirty: AtomicBool::new(false),
            last_access: AtomicU64::new(now),
            readers: AtomicUsize::new(0),
        }
    }

    /// World this region belongs to.
    #[inline]
    #[must_use]
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Region coordinates.
    #[inline]
    #[must_use]
    pub fn coord(&self) -> RegionCoord {
        self.coord
    }

    /// Adapter that materializes this region's chunks.
    #[must_use]
    pub fn adapter(&self) -> &Arc<A> {
        &self.adapter
    }

    /// Adapter region payload.
    #[must_use]
    pub fn payload(&self) -> &A::Region {
        &self.payload
    }

    /// Returns true if the region has edits not yet persisted.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Tick of the most recent access.
    #[inline]
    #[must_use]
    pub fn last_access(&self) -> u64 {
        self.last_access.load(Ordering::Acquire)
    }

    /// Number of live leases.
    #[inline]
    #[must_use]
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Acquire)
    }

    /// Resident chunk at `slot`, without decoding or creating anything.
    #[must_use]
    pub fn chunk(&self, slot: ChunkSlot) -> Option<Arc<A::Chunk>> {
        self.slots.read().chunks[slot.index()].clone()
    }

    /// Returns true if the chunk at `slot` is decoded and resident.
    #[must_use]
    pub fn is_resident(&self, slot: ChunkSlot) -> bool {
        self.slots.read().chunks[slot.index()].is_some()
    }

    /// Returns true if the chunk at `slot` is persisted but not yet decoded.
    #[must_use]
    pub fn is_pending(&self, slot: ChunkSlot) -> bool {
        self.slots.read().pending.contains_key(&slot)
    }

    /// Number of resident chunks.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.slots.read().chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Number of chunks still encoded.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.slots.read().pending.len()
    }

    /// Slots holding a chunk, resident or pending, in index order.
    #[must_use]
    pub fn occupied_slots(&self) -> Vec<ChunkSlot> {
        let slots = self.slots.read();
        ChunkSlot::all()
            .filter(|s| slots.chunks[s.index()].is_some() || slots.pending.contains_key(s))
            .collect()
    }

    pub(crate) fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::AcqRel);
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clears the dirty flag, returning whether it was set.
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Blocks until no other save of this region is in flight.
    pub(crate) fn lock_save(&self) -> MutexGuard<'_, ()> {
        self.save_guard.lock()
    }

    /// Returns true if a save of this region is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.save_guard.is_locked()
    }

    fn acquire(&self) {
        self.readers.fetch_add(1, Ordering::AcqRel);
    }

    /// Makes `slot` resident, decoding its blob or creating an empty chunk.
    fn materialize_slot(
        &self,
        slots: &mut SlotTable<A>,
        slot: ChunkSlot,
    ) -> (Arc<A::Chunk>, Option<StorageError>) {
        if let Some(chunk) = &slots.chunks[slot.index()] {
            return (Arc::clone(chunk), None);
        }

        let coord = self.coord.chunk(slot);
        let (chunk, error) = match slots.pending.remove(&slot) {
            Some(blob) => {
                match codec::decode_chunk(&*self.adapter, &self.payload, &slots.context, coord, &blob) {
                    Ok(chunk) => (chunk, None),
                    Err(e) => (self.adapter.new_chunk(&self.payload, coord), Some(e)),
                }
            }
            None => (self.adapter.new_chunk(&self.payload, coord), None),
        };
        let chunk = Arc::new(chunk);
        slots.chunks[slot.index()] = Some(Arc::clone(&chunk));
        (chunk, error)
    }

    /// Resident chunk at `slot`, decoding or creating it on miss.
    ///
    /// A blob that fails to decode is replaced by an empty chunk and the
    /// error is handed back for the caller to record.
    pub(crate) fn chunk_or_create(&self, slot: ChunkSlot) -> (Arc<A::Chunk>, Option<StorageError>) {
        if let Some(chunk) = self.chunk(slot) {
            return (chunk, None);
        }
        let mut slots = self.slots.write();
        self.materialize_slot(&mut slots, slot)
    }

    /// Decodes every pending blob. Returns the number decoded successfully.
    pub(crate) fn materialize_pending(&self) -> (usize, ChunkFailures) {
        let mut slots = self.slots.write();
        let pending: Vec<ChunkSlot> = slots.pending.keys().copied().collect();
        let mut decoded = 0;
        let mut failures = Vec::new();
        for slot in pending {
            match self.materialize_slot(&mut slots, slot) {
                (_, None) => decoded += 1,
                (_, Some(e)) => failures.push((slot, e)),
            }
        }
        (decoded, failures)
    }

    /// Applies an edit to the chunk at `slot` and marks the region dirty.
    ///
    /// `edit` runs on a private copy with the slot table unlocked, so it
    /// may read this region. Readers see the previous chunk until the copy
    /// is published.
    pub(crate) fn edit_chunk<R>(
        &self,
        slot: ChunkSlot,
        edit: impl FnOnce(&mut A::Chunk) -> R,
    ) -> (R, Option<StorageError>) {
        let _editing = self.edit_guard.lock();
        let (mut chunk, error) = {
            let mut slots = self.slots.write();
            self.materialize_slot(&mut slots, slot)
        };
        let result = edit(Arc::make_mut(&mut chunk));

        self.slots.write().chunks[slot.index()] = Some(chunk);
        self.mark_dirty();
        (result, error)
    }

    /// Drops the chunk at `slot`, resident or pending.
    pub(crate) fn invalidate_chunk(&self, slot: ChunkSlot) -> bool {
        let mut slots = self.slots.write();
        let resident = slots.chunks[slot.index()].take().is_some();
        let pending = slots.pending.remove(&slot).is_some();
        if resident || pending {
            self.mark_dirty();
        }
        resident || pending
    }

    /// Encodes the region with every chunk it holds.
    ///
    /// Pending blobs are decoded first: they were written against the old
    /// context, and encoding builds a fresh one.
    pub(crate) fn encode(&self) -> (Vec<u8>, ChunkFailures) {
        let mut slots = self.slots.write();
        let mut failures = Vec::new();
        let pending: Vec<ChunkSlot> = slots.pending.keys().copied().collect();
        for slot in pending {
            if let (_, Some(e)) = self.materialize_slot(&mut slots, slot) {
                failures.push((slot, e));
            }
        }

        let slots = RwLockWriteGuard::downgrade(slots);
        let chunks = slots
            .chunks
            .iter()
            .enumerate()
            .filter_map(|(index, chunk)| {
                chunk
                    .as_deref()
                    .map(|chunk| (ChunkSlot::from_index(index), chunk))
            });
        let bytes = codec::encode_region(&*self.adapter, self.coord, &self.payload, chunks);
        (bytes, failures)
    }
}

impl<A: StorageAdapter> fmt::Debug for MapRegion<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapRegion")
            .field("world", &self.world)
            .field("coord", &self.coord)
            .field("adapter", &A::NAME)
            .field("dirty", &self.is_dirty())
            .field("last_access", &self.last_access())
            .field("readers", &self.readers())
            .finish_non_exhaustive()
    }
}

/// Shared read handle on a resident region.
///
/// While any lease is alive the region is never evicted. Dropping the last
/// lease stamps the region's last access with the current tick, so the
/// retention window starts when the reader finishes.
pub struct RegionLease<A: StorageAdapter> {
    region: Arc<MapRegion<A>>,
    clock: Arc<TickClock>,
}

impl<A: StorageAdapter> RegionLease<A> {
    pub(crate) fn new(region: Arc<MapRegion<A>>, clock: Arc<TickClock>) -> Self {
        region.acquire();
        region.touch(clock.now());
        Self { region, clock }
    }

    /// The leased region.
    #[must_use]
    pub fn region(&self) -> &Arc<MapRegion<A>> {
        &self.region
    }
}

impl<A: StorageAdapter> Deref for RegionLease<A> {
    type Target = MapRegion<A>;

    fn deref(&self) -> &Self::Target {
        &self.region
    }
}

impl<A: StorageAdapter> Clone for RegionLease<A> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.region), Arc::clone(&self.clock))
    }
}

impl<A: StorageAdapter> Drop for RegionLease<A> {
    fn drop(&mut self) {
        self.region.touch(self.clock.now());
        self.region.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<A: StorageAdapter> fmt::Debug for RegionLease<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegionLease").field(&self.region).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnSample, RawTileAdapter};

    fn region() -> MapRegion<RawTileAdapter> {
        MapRegion::empty(Arc::new(RawTileAdapter), WorldId(0), RegionCoord::new(0, 0), 0)
    }

    #[test]
    fn test_non_creating_lookup_returns_none() {
        let region = region();
        assert!(region.chunk(ChunkSlot::new(4, 4)).is_none());
        assert_eq!(region.resident_count(), 0);
    }

    #[test]
    fn test_create_on_access() {
        let region = region();
        let (chunk, error) = region.chunk_or_create(ChunkSlot::new(4, 4));
        assert!(error.is_none());
        assert!(chunk.is_empty());
        assert!(region.is_resident(ChunkSlot::new(4, 4)));
        assert!(!region.is_dirty());
    }

    #[test]
    fn test_edit_is_copy_on_write() {
        let region = region();
        let slot = ChunkSlot::new(1, 2);
        let (before, _) = region.chunk_or_create(slot);

        region.edit_chunk(slot, |chunk| {
            chunk.set_sample(0, 0, ColumnSample::new(0xFF00_FF00, 64, 15));
        });

        assert!(before.is_empty(), "reader snapshot must not change");
        assert_eq!(region.chunk(slot).unwrap().sample(0, 0).argb, 0xFF00_FF00);
        assert!(region.is_dirty());
    }

    #[test]
    fn test_invalidate_chunk_marks_dirty() {
        let region = region();
        let slot = ChunkSlot::new(9, 9);
        assert!(!region.invalidate_chunk(slot));
        region.chunk_or_create(slot);
        assert!(region.invalidate_chunk(slot));
        assert!(region.is_dirty());
        assert!(region.chunk(slot).is_none());
    }

    #[test]
    fn test_lease_counts_readers() {
        let region = Arc::new(region());
        let clock = Arc::new(TickClock::starting_at(10));
        let lease = RegionLease::new(Arc::clone(&region), Arc::clone(&clock));
        let second = lease.clone();
        assert_eq!(region.readers(), 2);

        clock.advance(5);
        drop(lease);
        drop(second);
        assert_eq!(region.readers(), 0);
        assert_eq!(region.last_access(), 15);
    }

    #[test]
    fn test_encode_includes_pending_chunks() {
        let source = region();
        source.edit_chunk(ChunkSlot::new(3, 3), |chunk| {
            chunk.set_sample(5, 5, ColumnSample::new(0xFF12_3456, 10, 3));
        });
        let (bytes, failures) = source.encode();
        assert!(failures.is_empty());

        let adapter = Arc::new(RawTileAdapter);
        let decoded = codec::decode_region(&*adapter, RegionCoord::new(0, 0), &bytes).unwrap();
        let loaded = MapRegion::from_decoded(adapter, WorldId(0), RegionCoord::new(0, 0), decoded, 0);
        assert!(loaded.is_pending(ChunkSlot::new(3, 3)));

        // Re-encoding a region that was never touched keeps its chunks.
        let (again, _) = loaded.encode();
        let adapter = RawTileAdapter;
        let reloaded = codec::decode_region(&adapter, RegionCoord::new(0, 0), &again).unwrap();
        assert_eq!(reloaded.pending.len(), 1);
    }
}
