//! # Persistence Worker
//!
//! Background thread that decodes regions ahead of render passes, sweeps
//! expired regions on a fixed period and flushes everything on shutdown.
//!
//! ```text
//!   render / game thread ──Command──► [bounded channel] ──► worker
//!                                                            │ materialize
//!                                                            │ evict_expired (on timeout)
//!                                                            └ flush_all (on exit)
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::{EvictionReport, MapCache};
use crate::coord::{RegionCoord, WorldId};
use crate::error::StorageResult;
use crate::storage::StorageAdapter;

/// Queue depth for worker commands.
const COMMAND_QUEUE: usize = 1024;

enum Command {
    Materialize(WorldId, RegionCoord),
    Sweep(Sender<EvictionReport>),
    Shutdown,
}

/// Handle to the background persistence thread.
///
/// Dropping the handle stops the thread after a final flush.
pub struct PersistenceWorker {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    /// Starts the worker for `cache`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn<A: StorageAdapter>(cache: Arc<MapCache<A>>) -> StorageResult<Self> {
        let (commands, rx) = bounded(COMMAND_QUEUE);
        let handle = thread::Builder::new()
            .name("tessera-persist".to_string())
            .spawn(move || run(&cache, &rx))?;
        tracing::info!(adapter = A::NAME, "persistence worker started");
        Ok(Self {
            commands,
            handle: Some(handle),
        })
    }

    /// Queues a region for loading and chunk decoding.
    ///
    /// Returns false if the queue is full or the worker has stopped.
    pub fn request_materialize(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.commands
            .try_send(Command::Materialize(world, coord))
            .is_ok()
    }

    /// Runs an eviction sweep on the worker and waits for its report.
    ///
    /// Returns `None` if the worker has stopped.
    pub fn sweep_now(&self) -> Option<EvictionReport> {
        let (reply, report) = bounded(1);
        self.commands.send(Command::Sweep(reply)).ok()?;
        report.recv().ok()
    }

    /// Stops the worker and waits for its final flush.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.commands.send(Command::Shutdown);
        if handle.join().is_err() {
            tracing::error!("persistence worker panicked");
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for PersistenceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceWorker")
            .field("running", &self.handle.is_some())
            .field("queued", &self.commands.len())
            .finish()
    }
}

fn run<A: StorageAdapter>(cache: &MapCache<A>, commands: &Receiver<Command>) {
    let interval = cache.config().worker.sweep_interval();
    loop {
        match commands.recv_timeout(interval) {
            Ok(Command::Materialize(world, coord)) => match cache.materialize(world, coord) {
                Ok(decoded) => tracing::trace!(%world, region = %coord, decoded, "materialized"),
                Err(e) => tracing::warn!(%world, region = %coord, error = %e, "materialize failed"),
            },
            Ok(Command::Sweep(reply)) => {
                let _ = reply.send(sweep(cache));
            }
            Err(RecvTimeoutError::Timeout) => {
                sweep(cache);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    match cache.flush_all() {
        Ok(saved) => tracing::info!(saved, "persistence worker stopped"),
        Err(e) => tracing::error!(error = %e, "final flush left dirty regions"),
    }
}

fn sweep<A: StorageAdapter>(cache: &MapCache<A>) -> EvictionReport {
    let report = cache.evict_expired();
    if report.evicted > 0 || report.deferred > 0 {
        tracing::debug!(
            evicted = report.evicted,
            deferred = report.deferred,
            skipped = report.skipped,
            "eviction sweep"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TickClock;
    use crate::config::CacheConfig;
    use crate::coord::{ChunkCoord, ChunkSlot};
    use crate::storage::{ColumnSample, MemoryStore, RawTileAdapter, StorageRegistry};

    fn cache(store: Arc<MemoryStore>) -> Arc<MapCache<RawTileAdapter>> {
        let registry = Arc::new(StorageRegistry::new());
        let key = registry.register(RawTileAdapter).unwrap();
        let config = CacheConfig {
            retention_ticks: 5,
            ..CacheConfig::default()
        };
        let cache = MapCache::new(registry, store, Arc::new(TickClock::new()), config);
        cache.bind_world(WorldId(0), key).unwrap();
        Arc::new(cache)
    }

    #[test]
    fn test_shutdown_flushes_dirty_regions() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache(Arc::clone(&store));
        cache
            .edit_chunk(WorldId(0), ChunkCoord::new(40, -3), |c| {
                c.set_sample(1, 1, ColumnSample::new(0xFF01_0203, 5, 0));
            })
            .unwrap();

        let worker = PersistenceWorker::spawn(Arc::clone(&cache)).unwrap();
        worker.shutdown();

        assert!(store.contains(WorldId(0), "raw_tiles", RegionCoord::new(1, -1)));
    }

    #[test]
    fn test_materialize_then_sweep() {
        let store = Arc::new(MemoryStore::new());
        let writer = cache(Arc::clone(&store));
        writer
            .edit_chunk(WorldId(0), ChunkCoord::new(2, 2), |c| {
                c.set_sample(0, 0, ColumnSample::new(0xFF00_00FF, 1, 1));
            })
            .unwrap();
        writer.flush_all().unwrap();

        let reader = cache(store);
        let worker = PersistenceWorker::spawn(Arc::clone(&reader)).unwrap();
        assert!(worker.request_materialize(WorldId(0), RegionCoord::new(0, 0)));

        // Sweeps are processed in order, so the materialize has completed.
        assert_eq!(worker.sweep_now(), Some(EvictionReport::default()));
        assert!(reader.chunk_at(WorldId(0), ChunkCoord::new(2, 2)).is_some());
        assert!(reader
            .peek_region(WorldId(0), RegionCoord::new(0, 0))
            .is_some_and(|r| r.is_resident(ChunkSlot::new(2, 2))));

        reader.clock().advance(5);
        assert!(worker.sweep_now().is_some());
        assert!(!reader.is_resident(WorldId(0), RegionCoord::new(0, 0)));
    }
}
