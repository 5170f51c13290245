use std::{
  fs,
  io::ErrorKind,
  path::{Path, PathBuf},
  sync::Mutex,
};

use tracing::{debug, info};

use crate::{error::StoreError, model::AllocationStore};

/// Storage for the allocation store
///
/// Simulation writes it, batching reads it, and the phases never overlap. Each call stands
/// alone: a `load` followed by a `save` is not atomic, so phases must not run concurrently
/// against the same store.
pub trait AllocationRepository {
  fn load(&self) -> Result<AllocationStore, StoreError>;

  fn save(&self, store: &AllocationStore) -> Result<(), StoreError>;

  /// Remove participant entries and keep the reserved keys
  fn clear_participants(&self) -> Result<AllocationStore, StoreError> {
    let mut store = self.load()?;
    let removed = store.clear_participants();
    self.save(&store)?;
    info!(removed, "Cleared participant allocations");
    Ok(store)
  }
}

/// Pretty-printed JSON file; a missing file reads as an empty store
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
  path: PathBuf,
}

impl JsonFileRepository {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn io_error(&self, source: std::io::Error) -> StoreError {
    StoreError::Io { path: self.path.clone(), source }
  }
}

impl AllocationRepository for JsonFileRepository {
  fn load(&self) -> Result<AllocationStore, StoreError> {
    let raw = match fs::read_to_string(&self.path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "No allocation store yet");
        return Ok(AllocationStore::default());
      }
      Err(e) => return Err(self.io_error(e)),
    };

    if raw.trim().is_empty() {
      return Ok(AllocationStore::default());
    }

    serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
      path: self.path.clone(),
      source,
    })
  }

  fn save(&self, store: &AllocationStore) -> Result<(), StoreError> {
    let encoded = serde_json::to_string_pretty(store)?;

    // write beside the target, then rename over it
    let mut staging = self.path.clone().into_os_string();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    fs::write(&staging, encoded).map_err(|e| self.io_error(e))?;
    fs::rename(&staging, &self.path).map_err(|e| self.io_error(e))?;

    debug!(path = %self.path.display(), participants = store.len(), "Allocation store saved");
    Ok(())
  }
}

/// In-process store for tests and dry runs
///
/// The lock lets `save` take `&self` and keeps each call whole; it does not make a
/// `load`-then-`save` sequence atomic.
#[derive(Debug, Default)]
pub struct MemoryRepository {
  inner: Mutex<AllocationStore>,
}

impl MemoryRepository {
  pub fn new(store: AllocationStore) -> Self {
    Self { inner: Mutex::new(store) }
  }

  pub fn snapshot(&self) -> AllocationStore {
    match self.inner.lock() {
      Ok(guard) => guard.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

impl AllocationRepository for MemoryRepository {
  fn load(&self) -> Result<AllocationStore, StoreError> {
    Ok(self.snapshot())
  }

  fn save(&self, store: &AllocationStore) -> Result<(), StoreError> {
    let mut guard = match self.inner.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    *guard = store.clone();
    Ok(())
  }
}
