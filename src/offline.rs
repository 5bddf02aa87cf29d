//! Cache facade: the single entry point application code uses to create,
//! read, update and delete cached bookings and reference data.
//!
//! Every operation is a complete read-modify-write against the in-memory
//! blob, persisted before the call returns. Push attempts triggered by a
//! create or update are explicit background tasks the caller may await or
//! ignore; the local write is always durable before the task is scheduled.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::messenger::ClientMessage;
use crate::model::{
  generate_booking_id, BookingDraft, BookingStatus, CachedBooking, CachedData, SyncStatus,
};
use crate::network::{NetworkChange, NetworkMonitor};
use crate::remote::{BookingApi, HttpBookingApi};
use crate::store::{BlobStore, FileStore};
use crate::sync::SyncEngine;

/// State shared between the facade and the sync engine.
pub(crate) struct CacheCore {
  data: Mutex<CachedData>,
  store: Box<dyn BlobStore>,
  pub(crate) remote: Arc<dyn BookingApi>,
  pub(crate) network: NetworkMonitor,
}

impl CacheCore {
  pub(crate) fn read<R>(&self, f: impl FnOnce(&CachedData) -> R) -> R {
    let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
    f(&data)
  }

  /// Apply a mutation and persist immediately if it reports a change.
  pub(crate) fn mutate(&self, f: impl FnOnce(&mut CachedData) -> bool) -> bool {
    let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
    let changed = f(&mut data);
    if changed {
      self.store.save(&data);
    }
    changed
  }
}

/// Result of a booking creation: the assigned id plus the background push
/// task, present when the booking was created while online.
pub struct NewBooking {
  pub id: String,
  pub sync: Option<JoinHandle<SyncStatus>>,
}

/// The offline booking cache.
///
/// Explicitly constructed and injectable; clones share the same underlying
/// state. Remote failures never reach the caller: local operations always
/// succeed, and push outcomes land in each booking's `sync_status`.
#[derive(Clone)]
pub struct OfflineCache {
  core: Arc<CacheCore>,
}

impl OfflineCache {
  /// Build a cache from injected parts.
  pub fn new(
    store: Box<dyn BlobStore>,
    remote: Arc<dyn BookingApi>,
    network: NetworkMonitor,
  ) -> Self {
    let data = store.load();
    Self {
      core: Arc::new(CacheCore {
        data: Mutex::new(data),
        store,
        remote,
        network,
      }),
    }
  }

  /// Build a cache with the real file store and HTTP remote from config.
  pub fn open(config: &Config) -> Result<Self> {
    let store: Box<dyn BlobStore> = match &config.storage.path {
      Some(path) => Box::new(FileStore::open_at(path.clone())?),
      None => Box::new(FileStore::open()?),
    };
    let remote = Arc::new(HttpBookingApi::new(&config.remote.base_url));

    Ok(Self::new(store, remote, NetworkMonitor::new(true)))
  }

  // ===== Booking operations =====

  /// Create a booking. The local write is durable before this returns; when
  /// online, a push task is spawned and its handle returned alongside the id.
  pub fn create_booking(&self, draft: BookingDraft) -> NewBooking {
    let id = generate_booking_id();
    let booking = draft.into_booking(id.clone(), Utc::now());

    self.core.mutate(|data| {
      // Newest first
      data.bookings.insert(0, booking);
      true
    });
    debug!(booking_id = %id, "Cached new booking");

    let sync = self
      .core
      .network
      .is_online()
      .then(|| self.spawn_sync(id.clone()));

    NewBooking { id, sync }
  }

  /// Full booking list, newest first. The returned sequence is a snapshot;
  /// mutations go through the facade.
  pub fn get_bookings(&self) -> Vec<CachedBooking> {
    self.core.read(|data| data.bookings.clone())
  }

  pub fn get_booking(&self, id: &str) -> Option<CachedBooking> {
    self
      .core
      .read(|data| data.bookings.iter().find(|b| b.id == id).cloned())
  }

  /// Update a booking's business status. Always resets the sync status to
  /// `pending`; when online, spawns a push task and returns its handle.
  /// Unknown ids are a no-op.
  pub fn update_booking_status(
    &self,
    id: &str,
    status: BookingStatus,
  ) -> Option<JoinHandle<SyncStatus>> {
    let known = self.core.mutate(|data| {
      match data.bookings.iter_mut().find(|b| b.id == id) {
        Some(booking) => {
          booking.status = status;
          booking.sync_status = SyncStatus::Pending;
          true
        }
        None => false,
      }
    });

    if !known {
      debug!(booking_id = %id, "Ignoring status update for unknown booking");
      return None;
    }

    self
      .core
      .network
      .is_online()
      .then(|| self.spawn_sync(id.to_string()))
  }

  /// Remove a booking unconditionally, whatever its sync state. No remote
  /// call is made; a push already in flight may still reach the remote.
  pub fn delete_booking(&self, id: &str) -> bool {
    self.core.mutate(|data| {
      let before = data.bookings.len();
      data.bookings.retain(|b| b.id != id);
      data.bookings.len() != before
    })
  }

  // ===== Reference data =====

  /// Wholesale replace the cached services snapshot.
  pub fn cache_services(&self, services: Vec<Value>) {
    self.core.mutate(|data| {
      data.services = services;
      data.last_sync = Utc::now();
      true
    });
  }

  /// Wholesale replace the cached salons snapshot.
  pub fn cache_salons(&self, salons: Vec<Value>) {
    self.core.mutate(|data| {
      data.salons = salons;
      data.last_sync = Utc::now();
      true
    });
  }

  pub fn get_services(&self) -> Vec<Value> {
    self.core.read(|data| data.services.clone())
  }

  pub fn get_salons(&self) -> Vec<Value> {
    self.core.read(|data| data.salons.clone())
  }

  pub fn last_sync(&self) -> DateTime<Utc> {
    self.core.read(|data| data.last_sync)
  }

  // ===== Status surface =====

  /// Count of bookings in `pending` or `failed`, for user-visible badges.
  pub fn pending_sync_count(&self) -> usize {
    self.core.read(|data| data.pending_sync_count())
  }

  pub fn is_online(&self) -> bool {
    self.core.network.is_online()
  }

  pub fn subscribe_network(&self) -> broadcast::Receiver<NetworkChange> {
    self.core.network.subscribe()
  }

  pub fn network(&self) -> &NetworkMonitor {
    &self.core.network
  }

  /// Reset the cache to an empty blob.
  pub fn clear(&self) {
    self.core.mutate(|data| {
      *data = CachedData::empty();
      true
    });
  }

  // ===== Sync wiring =====

  /// Handle to the sync engine, for manual retry and bulk sync.
  pub fn sync_engine(&self) -> SyncEngine {
    SyncEngine::new(Arc::clone(&self.core))
  }

  fn spawn_sync(&self, id: String) -> JoinHandle<SyncStatus> {
    let engine = self.sync_engine();
    tokio::spawn(async move { engine.sync_booking(&id).await })
  }

  /// Spawn the page-side reconnect listener: each offline→online transition
  /// triggers exactly one bulk sync pass.
  pub fn spawn_reconnect_sync(&self) -> JoinHandle<()> {
    let engine = self.sync_engine();
    let mut rx = self.core.network.subscribe();

    tokio::spawn(async move {
      loop {
        match rx.recv().await {
          Ok(NetworkChange { is_online: true }) => {
            let report = engine.sync_pending().await;
            debug!(
              attempted = report.attempted,
              synced = report.synced,
              "Reconnect sync pass finished"
            );
          }
          Ok(NetworkChange { is_online: false }) => {}
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(skipped, "Missed network events, continuing");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    })
  }

  /// Spawn the page-side listener for worker messages: every
  /// `SYNC_BOOKINGS` message triggers one bulk sync pass.
  pub fn spawn_message_sync(
    &self,
    mut messages: broadcast::Receiver<ClientMessage>,
  ) -> JoinHandle<()> {
    let engine = self.sync_engine();

    tokio::spawn(async move {
      loop {
        match messages.recv().await {
          Ok(ClientMessage::SyncBookings) => {
            engine.sync_pending().await;
          }
          Err(broadcast::error::RecvError::Lagged(skipped)) => {
            warn!(skipped, "Missed worker messages, continuing");
          }
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    })
  }
}
