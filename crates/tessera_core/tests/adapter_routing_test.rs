//! Integration tests for adapter registration and per-world routing.

use std::sync::Arc;

use tessera_core::{
    CacheConfig, ChunkCoord, ColumnSample, MapCache, MemoryStore, PaletteTileAdapter,
    RawTileAdapter, RegionCoord, StorageAdapter, StorageError, StorageRegistry, TickClock,
    WorldId,
};

struct Session {
    registry: Arc<StorageRegistry>,
    store: Arc<MemoryStore>,
    raw: MapCache<RawTileAdapter>,
    palette: MapCache<PaletteTileAdapter>,
}

fn session() -> Session {
    let registry = Arc::new(StorageRegistry::new());
    let raw_key = registry.register(RawTileAdapter).unwrap();
    let palette_key = registry.register(PaletteTileAdapter).unwrap();
    registry.seal();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(TickClock::new());
    let raw = MapCache::new(
        Arc::clone(&registry),
        store.clone(),
        Arc::clone(&clock),
        CacheConfig::default(),
    );
    let palette = MapCache::new(
        Arc::clone(&registry),
        store.clone(),
        clock,
        CacheConfig::default(),
    );
    raw.bind_world(WorldId(0), raw_key).unwrap();
    palette.bind_world(WorldId(0), palette_key).unwrap();
    palette.bind_world(WorldId(1), palette_key).unwrap();

    Session {
        registry,
        store,
        raw,
        palette,
    }
}

#[test]
fn test_keys_are_distinct_and_typed() {
    let s = session();
    let raw = s.raw.world_key(WorldId(0)).unwrap();
    let palette = s.palette.world_key(WorldId(0)).unwrap();
    assert_ne!(raw.index(), palette.index());
    assert_eq!(raw.adapter_name(), "raw_tiles");
    assert_eq!(palette.adapter_name(), "palette_tiles");
    assert_eq!(s.registry.adapter_names(), vec!["raw_tiles", "palette_tiles"]);
    assert!(s.raw.world_key(WorldId(1)).is_none());
}

#[test]
fn test_registration_after_seal_fails() {
    let s = session();
    let err = s.registry.register(RawTileAdapter).unwrap_err();
    assert!(matches!(err, StorageError::RegistrySealed("raw_tiles")));
    assert_eq!(s.registry.len(), 2);
}

#[test]
fn test_key_from_another_registry_rejected() {
    let s = session();
    let foreign = StorageRegistry::new();
    let foreign_key = foreign.register(RawTileAdapter).unwrap();

    let err = s.raw.bind_world(WorldId(5), foreign_key).unwrap_err();
    assert!(matches!(err, StorageError::KeyMismatch { .. }));
    assert!(s.raw.world_key(WorldId(5)).is_none());
}

#[test]
fn test_adapters_persist_to_separate_namespaces() {
    let s = session();
    let chunk = ChunkCoord::new(4, 4);
    s.raw
        .edit_chunk(WorldId(0), chunk, |t| t.set_sample(0, 0, ColumnSample::new(0xFF00_00AA, 1, 1)))
        .unwrap();
    s.palette
        .edit_chunk(WorldId(0), chunk, |t| t.set_sample(0, 0, ColumnSample::new(0xFF00_00BB, 2, 2)))
        .unwrap();
    s.raw.flush_all().unwrap();
    s.palette.flush_all().unwrap();

    assert_eq!(s.store.len(), 2);
    assert!(s.store.contains(WorldId(0), RawTileAdapter::NAME, RegionCoord::new(0, 0)));
    assert!(s.store.contains(WorldId(0), PaletteTileAdapter::NAME, RegionCoord::new(0, 0)));

    s.raw.invalidate_region(WorldId(0), RegionCoord::new(0, 0));
    let raw = s.raw.get_region(WorldId(0), RegionCoord::new(0, 0)).unwrap();
    let tile = s.raw.get_chunk(&raw, chunk.slot(), true).unwrap();
    assert_eq!(tile.sample(0, 0).argb, 0xFF00_00AA);
}

#[test]
fn test_foreign_bytes_degrade_to_empty_region() {
    let s = session();
    let coord = RegionCoord::new(-1, 2);
    let chunk = coord.chunk(tessera_core::ChunkSlot::new(0, 0));
    s.raw
        .edit_chunk(WorldId(0), chunk, |t| t.set_sample(3, 3, ColumnSample::new(0xFF12_3456, 8, 8)))
        .unwrap();
    s.raw.flush_all().unwrap();

    // Raw bytes filed under the palette namespace of another world.
    let bytes = s.store.get_raw(WorldId(0), RawTileAdapter::NAME, coord).unwrap();
    s.store.insert_raw(WorldId(1), PaletteTileAdapter::NAME, coord, bytes);

    let region = s.palette.get_region(WorldId(1), coord).unwrap();
    assert!(region.occupied_slots().is_empty());
    assert!(!region.is_dirty());

    let diagnostics = s.palette.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].world, WorldId(1));
    assert_eq!(diagnostics[0].region, coord);
    assert!(diagnostics[0].message.contains("raw_tiles"), "{}", diagnostics[0].message);
    assert_eq!(s.palette.stats().corrupt_loads, 1);
}

#[test]
fn test_unbound_world_is_an_error() {
    let s = session();
    let err = s
        .raw
        .edit_chunk(WorldId(9), ChunkCoord::new(0, 0), |_| ())
        .unwrap_err();
    assert!(matches!(err, StorageError::UnboundWorld(WorldId(9))));
    assert!(s.raw.chunk_at(WorldId(9), ChunkCoord::new(0, 0)).is_none());
}
