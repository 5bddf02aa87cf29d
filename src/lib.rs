//! Offline-first booking cache with background synchronization.
//!
//! Two execution contexts, no shared memory:
//!
//! - The **page** context holds the persistent store. Application code goes
//!   through [`OfflineCache`], which persists every mutation immediately and
//!   tracks a per-booking sync status (`synced | pending | failed`). The
//!   [`sync::SyncEngine`] pushes pending bookings to the remote and absorbs
//!   every failure into that status; the [`network::NetworkMonitor`] triggers
//!   one bulk pass per reconnect.
//! - The **worker** context ([`worker::Worker`]) intercepts outgoing
//!   requests, serves them from versioned cache buckets with per-lane
//!   strategies, and on a deferred sync task wakes the pages through the
//!   [`messenger::Messenger`] rather than touching booking data itself.

pub mod config;
pub mod logging;
pub mod messenger;
pub mod model;
pub mod network;
pub mod offline;
pub mod remote;
pub mod store;
pub mod sync;
pub mod worker;

pub use config::Config;
pub use model::{BookingDraft, BookingStatus, CachedBooking, CachedData, SyncStatus};
pub use network::{NetworkChange, NetworkMonitor};
pub use offline::{NewBooking, OfflineCache};
pub use sync::{SyncEngine, SyncReport};
