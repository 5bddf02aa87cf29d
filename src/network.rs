//! Network monitor: translates runtime connectivity signals into
//! application-level `networkChange` events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

/// Application-level connectivity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkChange {
  pub is_online: bool,
}

/// Tracks the online/offline flag and publishes transitions.
///
/// Events are emitted only on an actual transition, never per tick while the
/// flag is unchanged, so a listener that bulk-syncs on reconnect runs exactly
/// once per offline→online edge. Going offline only updates the published
/// status; nothing is evicted and in-flight operations are left alone.
#[derive(Clone)]
pub struct NetworkMonitor {
  online: Arc<AtomicBool>,
  tx: broadcast::Sender<NetworkChange>,
}

impl NetworkMonitor {
  pub fn new(initially_online: bool) -> Self {
    let (tx, _) = broadcast::channel(16);
    Self {
      online: Arc::new(AtomicBool::new(initially_online)),
      tx,
    }
  }

  /// Current connectivity flag.
  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  /// Subscribe to connectivity transitions.
  pub fn subscribe(&self) -> broadcast::Receiver<NetworkChange> {
    self.tx.subscribe()
  }

  /// Feed the runtime's connectivity signal in. Publishes a `NetworkChange`
  /// only when the flag actually flips.
  pub fn set_online(&self, is_online: bool) {
    let previous = self.online.swap(is_online, Ordering::SeqCst);
    if previous == is_online {
      return;
    }

    info!(is_online, "Network status changed");
    // A send error just means nobody is listening right now
    let _ = self.tx.send(NetworkChange { is_online });
  }
}

impl Default for NetworkMonitor {
  fn default() -> Self {
    Self::new(true)
  }
}
