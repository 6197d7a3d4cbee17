//! # Region Stores
//!
//! Byte-level persistence of encoded regions, keyed by world, adapter name
//! and region coordinates. Stores know nothing about the encoding.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::coord::{RegionCoord, WorldId};
use crate::error::{StorageError, StorageResult};

/// Persistent home of encoded regions.
///
/// `load` returns `Ok(None)` when nothing was ever saved for the key.
pub trait RegionStore: Send + Sync {
    /// Reads the bytes last saved for a region.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the backing medium fails.
    fn load(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
    ) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the bytes stored for a region.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the backing medium fails; the previous bytes stay intact.
    fn save(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
        bytes: &[u8],
    ) -> StorageResult<()>;
}

/// One file per region under a root directory.
///
/// Layout: `<root>/<world>/<adapter>/r.<x>.<z>.tsr`. Saves go to a temp
/// file that is renamed over the old one, so a crash mid-save never leaves
/// a half-written region.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`. Directories are created on save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path of a region.
    #[must_use]
    pub fn region_path(&self, world: WorldId, adapter: &str, coord: RegionCoord) -> PathBuf {
        self.root
            .join(world.to_string())
            .join(adapter)
            .join(format!("{coord}.tsr"))
    }
}

impl RegionStore for DirectoryStore {
    fn load(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
    ) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.region_path(world, adapter, coord)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn save(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
        bytes: &[u8],
    ) -> StorageResult<()> {
        let path = self.region_path(world, adapter, coord);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let temp = path.with_extension("tsr.tmp");
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_data()?;
        }
        fs::rename(&temp, &path)?;
        Ok(())
    }
}

type MemoryKey = (WorldId, String, RegionCoord);

/// In-memory store for tests and tooling.
///
/// Can be told to fail upcoming saves to exercise retry paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: Mutex<HashMap<MemoryKey, Vec<u8>>>,
    failing_saves: AtomicU32,
    save_calls: AtomicU32,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` saves fail with an I/O error.
    pub fn fail_next_saves(&self, count: u32) {
        self.failing_saves.store(count, Ordering::Release);
    }

    /// Number of `save` calls, failed ones included.
    #[must_use]
    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::Acquire)
    }

    /// Stores bytes directly, bypassing any encoding.
    pub fn insert_raw(&self, world: WorldId, adapter: &str, coord: RegionCoord, bytes: Vec<u8>) {
        self.regions
            .lock()
            .insert((world, adapter.to_string(), coord), bytes);
    }

    /// Returns a copy of the bytes stored for a region.
    #[must_use]
    pub fn get_raw(&self, world: WorldId, adapter: &str, coord: RegionCoord) -> Option<Vec<u8>> {
        self.regions
            .lock()
            .get(&(world, adapter.to_string(), coord))
            .cloned()
    }

    /// Returns true if bytes exist for the region.
    #[must_use]
    pub fn contains(&self, world: WorldId, adapter: &str, coord: RegionCoord) -> bool {
        self.regions
            .lock()
            .contains_key(&(world, adapter.to_string(), coord))
    }

    /// Number of stored regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.lock().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.lock().is_empty()
    }
}

impl RegionStore for MemoryStore {
    fn load(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
    ) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.get_raw(world, adapter, coord))
    }

    fn save(
        &self,
        world: WorldId,
        adapter: &str,
        coord: RegionCoord,
        bytes: &[u8],
    ) -> StorageResult<()> {
        self.save_calls.fetch_add(1, Ordering::AcqRel);
        let failing = self
            .failing_saves
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StorageError::Io(std::io::Error::other("injected save failure")));
        }
        self.insert_raw(world, adapter, coord, bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("tessera_store_{tag}_{id}"))
    }

    #[test]
    fn test_directory_store_roundtrip() {
        let root = temp_root("roundtrip");
        let store = DirectoryStore::new(&root);
        let coord = RegionCoord::new(-2, 5);

        assert!(store.load(WorldId(1), "raw_tiles", coord).unwrap().is_none());
        store.save(WorldId(1), "raw_tiles", coord, b"first").unwrap();
        store.save(WorldId(1), "raw_tiles", coord, b"second").unwrap();
        assert_eq!(
            store.load(WorldId(1), "raw_tiles", coord).unwrap().as_deref(),
            Some(&b"second"[..])
        );
        assert!(store
            .region_path(WorldId(1), "raw_tiles", coord)
            .ends_with("w1/raw_tiles/r.-2.5.tsr"));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_directory_store_separates_adapters() {
        let root = temp_root("adapters");
        let store = DirectoryStore::new(&root);
        let coord = RegionCoord::new(0, 0);

        store.save(WorldId(0), "raw_tiles", coord, b"raw").unwrap();
        assert!(store.load(WorldId(0), "palette_tiles", coord).unwrap().is_none());

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_memory_store_injected_failures() {
        let store = MemoryStore::new();
        let coord = RegionCoord::new(0, 0);
        store.fail_next_saves(2);

        assert!(store.save(WorldId(0), "a", coord, b"x").is_err());
        assert!(store.save(WorldId(0), "a", coord, b"x").is_err());
        assert!(store.save(WorldId(0), "a", coord, b"x").is_ok());
        assert_eq!(store.save_calls(), 3);
        assert!(store.contains(WorldId(0), "a", coord));
    }
}
