//! Persistent store for the cache blob.
//!
//! The entire cache is one JSON document under a versioned storage key.
//! `load` never fails: a missing or corrupt blob bootstraps an empty cache.
//! `save` never fails either; a write error is logged and the session simply
//! degrades to in-memory-only until the medium recovers.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, warn};

use crate::model::CachedData;

/// Storage key version. Bumping it starts from an empty cache; old blobs are
/// never migrated.
pub const STORE_VERSION: &str = "v1";

/// Trait for persistent store backends.
///
/// Every mutation in the system is persisted immediately through this trait,
/// with no batching or debounce. Booking data loss is worse than write
/// amplification here.
pub trait BlobStore: Send + Sync {
  /// Load the cache blob, falling back to a well-formed empty cache on any
  /// missing, unreadable or unparsable underlying storage.
  fn load(&self) -> CachedData;

  /// Persist the cache blob. Failures are absorbed (logged), never raised.
  fn save(&self, data: &CachedData);
}

fn decode(blob: &str) -> Option<CachedData> {
  match serde_json::from_str(blob) {
    Ok(data) => Some(data),
    Err(e) => {
      warn!(error = %e, "Corrupt cache blob, starting empty");
      None
    }
  }
}

/// File-backed store: one JSON document at a versioned path.
pub struct FileStore {
  path: PathBuf,
}

impl FileStore {
  /// Open a file store at the default location
  /// (`<data_dir>/bookcache/cache_v1.json`).
  pub fn open() -> Result<Self> {
    Self::open_at(Self::default_path()?)
  }

  /// Open a file store at an explicit path, creating parent directories.
  pub fn open_at(path: PathBuf) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    Ok(Self { path })
  }

  /// Default blob path, keyed by [`STORE_VERSION`].
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(
      data_dir
        .join("bookcache")
        .join(format!("cache_{}.json", STORE_VERSION)),
    )
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl BlobStore for FileStore {
  fn load(&self) -> CachedData {
    let blob = match std::fs::read_to_string(&self.path) {
      Ok(blob) => blob,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "No cache blob yet, starting empty");
        return CachedData::empty();
      }
      Err(e) => {
        warn!(path = %self.path.display(), error = %e, "Failed to read cache blob");
        return CachedData::empty();
      }
    };

    decode(&blob).unwrap_or_else(CachedData::empty)
  }

  fn save(&self, data: &CachedData) {
    let blob = match serde_json::to_string(data) {
      Ok(blob) => blob,
      Err(e) => {
        warn!(error = %e, "Failed to serialize cache blob");
        return;
      }
    };

    if let Err(e) = std::fs::write(&self.path, blob) {
      warn!(path = %self.path.display(), error = %e, "Failed to write cache blob");
    }
  }
}

/// In-memory store, used for memory-only sessions and in tests.
///
/// Retains the serialized form so save/load round-trip semantics match the
/// file store.
#[derive(Default)]
pub struct MemoryStore {
  blob: Mutex<Option<String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seed the store with a raw blob, valid or not. Test hook for corruption
  /// handling.
  pub fn with_blob(blob: impl Into<String>) -> Self {
    Self {
      blob: Mutex::new(Some(blob.into())),
    }
  }
}

impl BlobStore for MemoryStore {
  fn load(&self) -> CachedData {
    let blob = self.blob.lock().unwrap_or_else(|e| e.into_inner());
    blob
      .as_deref()
      .and_then(decode)
      .unwrap_or_else(CachedData::empty)
  }

  fn save(&self, data: &CachedData) {
    match serde_json::to_string(data) {
      Ok(encoded) => {
        *self.blob.lock().unwrap_or_else(|e| e.into_inner()) = Some(encoded);
      }
      Err(e) => warn!(error = %e, "Failed to serialize cache blob"),
    }
  }
}
