//! Data model for the offline booking cache.
//!
//! Field names are serialized in camelCase so the persisted blob keeps the
//! layout expected by the surrounding application:
//! `{ bookings: [...], services: [...], salons: [...], lastSync: "..." }`.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Business state of a booking, distinct from its sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
  Pending,
  Confirmed,
  Cancelled,
}

/// Synchronization state of a booking relative to the remote service.
///
/// There is no terminal state: `Pending` and `Failed` are both retryable
/// indefinitely, on reconnect or by manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
  /// The remote acknowledged the booking's current content
  Synced,
  /// Not yet acknowledged by the remote
  Pending,
  /// A push attempt was made and rejected or errored
  Failed,
}

impl SyncStatus {
  /// Whether a bulk sync pass should attempt this booking.
  pub fn needs_sync(&self) -> bool {
    matches!(self, SyncStatus::Pending | SyncStatus::Failed)
  }
}

/// A locally persisted booking record plus its synchronization status.
///
/// The payload fields (`service_details`, `personal_info`, `payment`,
/// `salon`, `date`) are owned by the caller; the engine never interprets
/// their contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedBooking {
  /// Opaque unique id, generated locally at creation time, never reused
  pub id: String,
  pub service_details: Value,
  pub personal_info: Value,
  pub payment: Value,
  pub salon: Value,
  pub date: String,
  pub status: BookingStatus,
  /// Set once at creation, immutable thereafter
  pub created_at: DateTime<Utc>,
  pub sync_status: SyncStatus,
}

/// Caller-supplied fields for a new booking.
///
/// `id`, `created_at` and `sync_status` are assigned by the cache facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
  pub service_details: Value,
  pub personal_info: Value,
  pub payment: Value,
  pub salon: Value,
  pub date: String,
  pub status: BookingStatus,
}

impl BookingDraft {
  pub(crate) fn into_booking(self, id: String, created_at: DateTime<Utc>) -> CachedBooking {
    CachedBooking {
      id,
      service_details: self.service_details,
      personal_info: self.personal_info,
      payment: self.payment,
      salon: self.salon,
      date: self.date,
      status: self.status,
      created_at,
      sync_status: SyncStatus::Pending,
    }
  }
}

/// The entire persisted cache blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedData {
  /// Newest first; insertion order is preserved across reloads
  pub bookings: Vec<CachedBooking>,
  /// Reference-data snapshot, wholesale replaced on refresh
  pub services: Vec<Value>,
  /// Reference-data snapshot, wholesale replaced on refresh
  pub salons: Vec<Value>,
  /// Timestamp of the last successful reference-data refresh
  pub last_sync: DateTime<Utc>,
}

impl CachedData {
  /// A well-formed empty cache. Used as the bootstrap state whenever the
  /// underlying storage is missing or corrupt.
  pub fn empty() -> Self {
    Self {
      bookings: Vec::new(),
      services: Vec::new(),
      salons: Vec::new(),
      last_sync: Utc::now(),
    }
  }

  /// Count of bookings awaiting a successful push.
  pub fn pending_sync_count(&self) -> usize {
    self
      .bookings
      .iter()
      .filter(|b| b.sync_status.needs_sync())
      .count()
  }
}

impl Default for CachedData {
  fn default() -> Self {
    Self::empty()
  }
}

/// Generate a booking id: millisecond timestamp plus a random suffix.
pub fn generate_booking_id() -> String {
  let suffix: String = rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(9)
    .map(|c| (c as char).to_ascii_lowercase())
    .collect();

  format!("booking_{}_{}", Utc::now().timestamp_millis(), suffix)
}
