//! # Storage Error Types
//!
//! All errors that can occur while registering adapters, loading and saving
//! regions.
//!
//! "Not resident" is never an error: lookups signal it with `Option`/`bool`.

use thiserror::Error;

use crate::coord::WorldId;

/// Errors that can occur in the storage and cache layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing store failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted bytes ended before a complete value could be read.
    #[error("truncated data: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes the reader asked for.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Persisted bytes are structurally invalid.
    #[error("corrupt region data: {0}")]
    Corrupt(String),

    /// Region bytes were written by a different adapter.
    #[error("region written by adapter `{found}`, expected `{expected}`")]
    AdapterMismatch {
        /// Adapter the caller routed the bytes to.
        expected: &'static str,
        /// Adapter named in the region header.
        found: String,
    },

    /// A storage key was presented to a registry or adapter that did not issue it.
    #[error("storage key #{index} was not issued to adapter `{adapter}` by this registry")]
    KeyMismatch {
        /// Index carried by the key.
        index: u32,
        /// Adapter type the key claims to route to.
        adapter: &'static str,
    },

    /// Registration was attempted after the registry was sealed.
    #[error("registry is sealed; adapter `{0}` registered after load phase")]
    RegistrySealed(&'static str),

    /// No storage key is bound to the world.
    #[error("world {0} has no bound storage key")]
    UnboundWorld(WorldId),

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Returns true for errors caused by the persisted bytes themselves.
    ///
    /// These are the errors a load degrades to an empty region on.
    #[must_use]
    pub const fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::Corrupt(_) | Self::AdapterMismatch { .. }
        )
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
