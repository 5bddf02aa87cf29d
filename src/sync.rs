//! Sync engine: owns the per-booking synchronization state machine.
//!
//! States: `pending` (not yet acknowledged), `synced` (acknowledged),
//! `failed` (an attempt was rejected or errored). No state is terminal;
//! `pending` and `failed` retry on reconnect or by manual force-sync. All
//! remote failures are absorbed into sync status, never raised to callers.

use std::sync::Arc;

use tracing::{debug, info};

use crate::model::SyncStatus;
use crate::offline::CacheCore;

/// Outcome of a bulk sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Bookings the pass attempted (those in `pending` or `failed`)
  pub attempted: usize,
  pub synced: usize,
  pub failed: usize,
}

/// Pushes locally created or updated bookings to the remote service and
/// records each outcome. Cheap to create; shares state with the facade.
#[derive(Clone)]
pub struct SyncEngine {
  core: Arc<CacheCore>,
}

impl SyncEngine {
  pub(crate) fn new(core: Arc<CacheCore>) -> Self {
    Self { core }
  }

  /// Push a single booking and record the outcome. Usable as the manual
  /// force-sync from `failed` or `pending`.
  ///
  /// Offline or unknown ids are a no-op: the current recorded status is
  /// returned without an attempt. The push itself runs without holding the
  /// cache lock, so a booking deleted mid-flight may still reach the remote;
  /// its outcome is then discarded locally.
  pub async fn sync_booking(&self, id: &str) -> SyncStatus {
    let snapshot = self
      .core
      .read(|data| data.bookings.iter().find(|b| b.id == id).cloned());

    let Some(booking) = snapshot else {
      return SyncStatus::Pending;
    };

    if !self.core.network.is_online() {
      return booking.sync_status;
    }

    let outcome = match self.core.remote.push_booking(&booking).await {
      Ok(()) => SyncStatus::Synced,
      Err(e) => {
        debug!(booking_id = %id, error = %e, "Booking push failed");
        SyncStatus::Failed
      }
    };

    let recorded = self.core.mutate(|data| {
      match data.bookings.iter_mut().find(|b| b.id == id) {
        Some(booking) => {
          booking.sync_status = outcome;
          true
        }
        // Deleted while the push was in flight
        None => false,
      }
    });

    if !recorded {
      debug!(booking_id = %id, "Booking deleted during sync, outcome dropped");
    }

    outcome
  }

  /// Push every booking in `pending` or `failed`, each independently; one
  /// booking's failure neither blocks nor rolls back another's attempt.
  ///
  /// The needs-sync population can only shrink as a result of a pass:
  /// successes leave it, failures stay where they were.
  pub async fn sync_pending(&self) -> SyncReport {
    if !self.core.network.is_online() {
      return SyncReport::default();
    }

    let ids: Vec<String> = self.core.read(|data| {
      data
        .bookings
        .iter()
        .filter(|b| b.sync_status.needs_sync())
        .map(|b| b.id.clone())
        .collect()
    });

    let mut report = SyncReport {
      attempted: ids.len(),
      ..SyncReport::default()
    };

    for id in &ids {
      match self.sync_booking(id).await {
        SyncStatus::Synced => report.synced += 1,
        _ => report.failed += 1,
      }
    }

    if report.attempted > 0 {
      info!(
        attempted = report.attempted,
        synced = report.synced,
        failed = report.failed,
        "Bulk sync pass finished"
      );
    }

    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{BookingDraft, BookingStatus, CachedBooking};
  use crate::network::NetworkMonitor;
  use crate::offline::OfflineCache;
  use crate::remote::BookingApi;
  use crate::store::MemoryStore;
  use async_trait::async_trait;
  use color_eyre::{eyre::eyre, Result};
  use serde_json::json;
  use std::collections::HashSet;
  use std::sync::Mutex;

  /// Remote fake that rejects a configurable set of booking ids.
  struct SelectiveRemote {
    reject: Mutex<HashSet<String>>,
    seen: Mutex<Vec<String>>,
  }

  impl SelectiveRemote {
    fn new() -> Self {
      Self {
        reject: Mutex::new(HashSet::new()),
        seen: Mutex::new(Vec::new()),
      }
    }

    fn reject_id(&self, id: &str) {
      self.reject.lock().unwrap().insert(id.to_string());
    }

    fn accept_all(&self) {
      self.reject.lock().unwrap().clear();
    }

    fn seen(&self) -> Vec<String> {
      self.seen.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl BookingApi for SelectiveRemote {
    async fn push_booking(&self, booking: &CachedBooking) -> Result<()> {
      self.seen.lock().unwrap().push(booking.id.clone());
      if self.reject.lock().unwrap().contains(&booking.id) {
        Err(eyre!("Remote rejected {}", booking.id))
      } else {
        Ok(())
      }
    }
  }

  fn draft() -> BookingDraft {
    BookingDraft {
      service_details: json!({"name": "Massage"}),
      personal_info: json!({"name": "Kim"}),
      payment: json!({"method": "card"}),
      salon: json!({"id": 2}),
      date: "2026-09-03".to_string(),
      status: BookingStatus::Pending,
    }
  }

  fn offline_cache(remote: Arc<SelectiveRemote>) -> OfflineCache {
    OfflineCache::new(
      Box::new(MemoryStore::new()),
      remote,
      NetworkMonitor::new(false),
    )
  }

  #[tokio::test]
  async fn test_bulk_sync_attempts_exactly_the_pending_set() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));

    let a = cache.create_booking(draft()).id;
    let b = cache.create_booking(draft()).id;
    let c = cache.create_booking(draft()).id;
    assert_eq!(cache.pending_sync_count(), 3);

    cache.network().set_online(true);
    let report = cache.sync_engine().sync_pending().await;

    assert_eq!(report, SyncReport { attempted: 3, synced: 3, failed: 0 });
    assert_eq!(cache.pending_sync_count(), 0);

    let seen: HashSet<String> = remote.seen().into_iter().collect();
    let expected: HashSet<String> = [a, b, c].into_iter().collect();
    assert_eq!(seen, expected);

    // A second pass has nothing to do
    let report = cache.sync_engine().sync_pending().await;
    assert_eq!(report, SyncReport::default());
  }

  #[tokio::test]
  async fn test_one_failure_does_not_block_others() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));

    let good = cache.create_booking(draft()).id;
    let bad = cache.create_booking(draft()).id;
    remote.reject_id(&bad);

    cache.network().set_online(true);
    let report = cache.sync_engine().sync_pending().await;

    assert_eq!(report, SyncReport { attempted: 2, synced: 1, failed: 1 });
    assert_eq!(
      cache.get_booking(&good).unwrap().sync_status,
      SyncStatus::Synced
    );
    assert_eq!(
      cache.get_booking(&bad).unwrap().sync_status,
      SyncStatus::Failed
    );
    // Failures leave the needs-sync count unchanged, never grow it
    assert_eq!(cache.pending_sync_count(), 1);
  }

  #[tokio::test]
  async fn test_force_sync_recovers_failed_booking() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));

    let id = cache.create_booking(draft()).id;
    remote.reject_id(&id);
    cache.network().set_online(true);

    let engine = cache.sync_engine();
    assert_eq!(engine.sync_booking(&id).await, SyncStatus::Failed);

    remote.accept_all();
    assert_eq!(engine.sync_booking(&id).await, SyncStatus::Synced);
    assert_eq!(
      cache.get_booking(&id).unwrap().sync_status,
      SyncStatus::Synced
    );
  }

  #[tokio::test]
  async fn test_sync_offline_is_noop() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));

    let id = cache.create_booking(draft()).id;
    let engine = cache.sync_engine();

    assert_eq!(engine.sync_booking(&id).await, SyncStatus::Pending);
    assert_eq!(engine.sync_pending().await, SyncReport::default());
    assert!(remote.seen().is_empty());
  }

  #[tokio::test]
  async fn test_sync_unknown_id_is_noop() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));
    cache.network().set_online(true);

    let engine = cache.sync_engine();
    assert_eq!(engine.sync_booking("booking_0_gone").await, SyncStatus::Pending);
    assert!(remote.seen().is_empty());
  }

  #[tokio::test]
  async fn test_synced_booking_resyncs_after_update() {
    let remote = Arc::new(SelectiveRemote::new());
    let cache = offline_cache(Arc::clone(&remote));

    let id = cache.create_booking(draft()).id;
    cache.network().set_online(true);
    cache.sync_engine().sync_pending().await;
    assert_eq!(cache.pending_sync_count(), 0);

    cache.network().set_online(false);
    cache.update_booking_status(&id, BookingStatus::Cancelled);
    assert_eq!(
      cache.get_booking(&id).unwrap().sync_status,
      SyncStatus::Pending
    );

    cache.network().set_online(true);
    let report = cache.sync_engine().sync_pending().await;
    assert_eq!(report.synced, 1);
    assert_eq!(
      cache.get_booking(&id).unwrap().sync_status,
      SyncStatus::Synced
    );
  }
}
