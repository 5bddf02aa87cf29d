//! Cross-context messenger: worker → page notification channel.
//!
//! The worker cannot touch the page's persistent store, so when its deferred
//! sync task fires it broadcasts a single message kind and the page contexts
//! run the bulk sync themselves.

use tokio::sync::broadcast;
use tracing::debug;

/// Message sent from the worker to all open page clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
  /// "Attempt a bulk sync now." Carries no payload.
  SyncBookings,
}

/// Broadcast channel from the worker context to any number of page contexts.
///
/// Delivery is best-effort: a page that lags and drops a wake-up will catch
/// up on the next reconnect transition.
#[derive(Clone)]
pub struct Messenger {
  tx: broadcast::Sender<ClientMessage>,
}

impl Messenger {
  pub fn new() -> Self {
    let (tx, _) = broadcast::channel(16);
    Self { tx }
  }

  /// Register a page client.
  pub fn subscribe(&self) -> broadcast::Receiver<ClientMessage> {
    self.tx.subscribe()
  }

  /// Send a message to all currently subscribed page clients. Returns how
  /// many clients were reachable.
  pub fn broadcast(&self, message: ClientMessage) -> usize {
    match self.tx.send(message) {
      Ok(clients) => clients,
      Err(_) => {
        debug!(?message, "No page clients connected");
        0
      }
    }
  }
}

impl Default for Messenger {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_broadcast_reaches_all_clients() {
    let messenger = Messenger::new();
    let mut a = messenger.subscribe();
    let mut b = messenger.subscribe();

    assert_eq!(messenger.broadcast(ClientMessage::SyncBookings), 2);
    assert_eq!(a.recv().await.unwrap(), ClientMessage::SyncBookings);
    assert_eq!(b.recv().await.unwrap(), ClientMessage::SyncBookings);
  }

  #[test]
  fn test_broadcast_without_clients() {
    let messenger = Messenger::new();
    assert_eq!(messenger.broadcast(ClientMessage::SyncBookings), 0);
  }
}
