//! # Storage Adapter Registry
//!
//! Explicit registry owned by the hosting session. Adapters are registered
//! during extension initialization; `seal()` closes the load phase and any
//! later registration is rejected.
//!
//! ## Keys
//!
//! `StorageKey<A>` is typed by the adapter it routes to, so routing a key to
//! a different adapter type does not compile. Keys also carry the id of the
//! registry that issued them; presenting a key to another registry is a
//! `KeyMismatch`.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::storage::adapter::StorageAdapter;

/// Source of process-unique registry ids.
static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque routing token for one registered adapter.
pub struct StorageKey<A> {
    registry: u32,
    index: u32,
    _adapter: PhantomData<fn() -> A>,
}

impl<A: StorageAdapter> StorageKey<A> {
    /// Position of the adapter in its registry.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Name of the adapter type this key routes to.
    #[inline]
    #[must_use]
    pub const fn adapter_name(&self) -> &'static str {
        A::NAME
    }
}

impl<A> Clone for StorageKey<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for StorageKey<A> {}

impl<A> PartialEq for StorageKey<A> {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry && self.index == other.index
    }
}

impl<A> Eq for StorageKey<A> {}

impl<A> Hash for StorageKey<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.registry.hash(state);
        self.index.hash(state);
    }
}

impl<A> fmt::Debug for StorageKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageKey")
            .field("registry", &self.registry)
            .field("index", &self.index)
            .finish()
    }
}

struct Entry {
    name: &'static str,
    adapter: Arc<dyn Any + Send + Sync>,
}

/// Registry of storage adapters for one hosting session.
pub struct StorageRegistry {
    id: u32,
    entries: RwLock<Vec<Entry>>,
    sealed: AtomicBool,
}

impl StorageRegistry {
    /// Creates an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            entries: RwLock::new(Vec::new()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Registers an adapter and returns its key.
    ///
    /// # Errors
    ///
    /// Returns `RegistrySealed` if the load phase has closed.
    pub fn register<A: StorageAdapter>(&self, adapter: A) -> StorageResult<StorageKey<A>> {
        let mut entries = self.entries.write();
        if self.sealed.load(Ordering::Acquire) {
            tracing::warn!(adapter = A::NAME, "rejected adapter registration after seal");
            return Err(StorageError::RegistrySealed(A::NAME));
        }

        let index = entries.len() as u32;
        entries.push(Entry {
            name: A::NAME,
            adapter: Arc::new(adapter),
        });
        tracing::debug!(adapter = A::NAME, index, "registered storage adapter");

        Ok(StorageKey {
            registry: self.id,
            index,
            _adapter: PhantomData,
        })
    }

    /// Closes the load phase. Idempotent.
    pub fn seal(&self) {
        let entries = self.entries.write();
        if !self.sealed.swap(true, Ordering::AcqRel) {
            tracing::info!(adapters = entries.len(), "storage registry sealed");
        }
    }

    /// Returns true once `seal` has been called.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no adapter has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Names of registered adapters in registration order.
    #[must_use]
    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.entries.read().iter().map(|e| e.name).collect()
    }

    /// Resolves a key to the adapter that issued it.
    ///
    /// # Errors
    ///
    /// Returns `KeyMismatch` if the key came from another registry or does
    /// not name an adapter of type `A`.
    pub fn adapter<A: StorageAdapter>(&self, key: &StorageKey<A>) -> StorageResult<Arc<A>> {
        let mismatch = || StorageError::KeyMismatch {
            index: key.index,
            adapter: A::NAME,
        };
        if key.registry != self.id {
            return Err(mismatch());
        }

        let entries = self.entries.read();
        let entry = entries.get(key.index as usize).ok_or_else(mismatch)?;
        Arc::clone(&entry.adapter)
            .downcast::<A>()
            .map_err(|_| mismatch())
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("id", &self.id)
            .field("adapters", &self.adapter_names())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}
