//! Worker cache layer: a separate execution context that intercepts outgoing
//! requests, serves them from versioned cache buckets, and wakes the page
//! contexts for a bulk sync when the deferred sync task fires.
//!
//! The worker shares no memory with the page. It is modeled as an actor:
//! commands arrive on a channel, observable side effects (page messages,
//! notifications, window opens) leave on channels. The runtime may drop and
//! respawn it at any time; a respawn reattaches to the same buckets and
//! re-runs install/activate.

pub mod buckets;
pub mod fetch;
pub mod router;

use std::sync::Arc;

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::messenger::{ClientMessage, Messenger};
use self::buckets::CacheBuckets;
use self::fetch::Fetch;
use self::router::{Request, Response, Router};

/// Standard worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Installing,
  Installed,
  Activating,
  Activated,
}

/// Push payload from the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub booking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

/// A user notification rendered for a push payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub tag: String,
  pub booking_id: String,
  pub actions: Vec<NotificationAction>,
}

/// Commands delivered to the worker by the runtime.
pub enum WorkerEvent {
  /// An intercepted outgoing request, with a reply channel
  Fetch {
    request: Request,
    reply: oneshot::Sender<Result<Response>>,
  },
  /// A deferred background-sync task fired
  Sync { tag: String },
  /// A push payload arrived
  Push(PushPayload),
  /// The user clicked a notification action
  NotificationClick { action: String, booking_id: String },
}

/// Observable side effects the host runtime renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEffect {
  ShowNotification(Notification),
  OpenWindow(String),
}

/// Handle held by the host runtime: send events in, read effects out.
pub struct WorkerHandle {
  events: mpsc::UnboundedSender<WorkerEvent>,
  pub effects: mpsc::UnboundedReceiver<WorkerEffect>,
  task: JoinHandle<()>,
}

impl WorkerHandle {
  /// Route a request through the worker and await its response.
  pub async fn fetch(&self, request: Request) -> Result<Response> {
    let (reply, rx) = oneshot::channel();
    self
      .events
      .send(WorkerEvent::Fetch { request, reply })
      .map_err(|_| eyre!("Worker is gone"))?;
    rx.await.map_err(|_| eyre!("Worker dropped the request"))?
  }

  /// Fire a named deferred sync task.
  pub fn fire_sync(&self, tag: &str) {
    let _ = self.events.send(WorkerEvent::Sync {
      tag: tag.to_string(),
    });
  }

  pub fn push(&self, payload: PushPayload) {
    let _ = self.events.send(WorkerEvent::Push(payload));
  }

  pub fn notification_click(&self, action: &str, booking_id: &str) {
    let _ = self.events.send(WorkerEvent::NotificationClick {
      action: action.to_string(),
      booking_id: booking_id.to_string(),
    });
  }

  /// Terminate the worker, as the runtime may at any time.
  pub fn terminate(self) {
    self.task.abort();
  }
}

/// The worker actor.
pub struct Worker {
  config: WorkerConfig,
  buckets: Arc<CacheBuckets>,
  network: Arc<dyn Fetch>,
  messenger: Messenger,
  state: LifecycleState,
}

impl Worker {
  /// Install, activate, and start serving events. Fails if the precache
  /// manifest cannot be fully fetched, like a rejected install.
  pub async fn spawn(
    config: WorkerConfig,
    buckets: Arc<CacheBuckets>,
    network: Arc<dyn Fetch>,
    messenger: Messenger,
  ) -> Result<WorkerHandle> {
    let mut worker = Self {
      config,
      buckets,
      network,
      messenger,
      state: LifecycleState::Installing,
    };

    worker.install().await?;
    worker.activate();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (effects_tx, effects_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(worker.run(events_rx, effects_tx));

    Ok(WorkerHandle {
      events: events_tx,
      effects: effects_rx,
      task,
    })
  }

  /// Pre-fetch the static manifest into the versioned static bucket. Any
  /// failed or unhappy fetch fails the whole install.
  async fn install(&mut self) -> Result<()> {
    self.state = LifecycleState::Installing;
    let bucket = CacheBuckets::static_name(&self.config.cache_version);

    for path in &self.config.precache {
      let response = self
        .network
        .fetch(&Request::get(path.clone()))
        .await
        .map_err(|e| eyre!("Install failed precaching {}: {}", path, e))?;

      if !response.is_success() {
        return Err(eyre!(
          "Install failed precaching {}: status {}",
          path,
          response.status
        ));
      }

      self.buckets.put(&bucket, path, response);
    }

    info!(
      bucket = %bucket,
      assets = self.config.precache.len(),
      "Worker installed"
    );
    self.state = LifecycleState::Installed;
    Ok(())
  }

  /// Drop buckets from other builds, then claim open pages immediately.
  fn activate(&mut self) {
    self.state = LifecycleState::Activating;

    let keep = [
      CacheBuckets::static_name(&self.config.cache_version),
      CacheBuckets::dynamic_name(&self.config.cache_version),
    ];
    for name in self.buckets.names() {
      if !keep.contains(&name) {
        self.buckets.delete(&name);
      }
    }

    self.state = LifecycleState::Activated;
    info!(version = %self.config.cache_version, "Worker activated, clients claimed");
  }

  async fn run(
    self,
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    effects: mpsc::UnboundedSender<WorkerEffect>,
  ) {
    let router = Router::new(
      self.config.clone(),
      Arc::clone(&self.buckets),
      Arc::clone(&self.network),
    );
    debug!(state = ?self.state, "Worker serving events");

    while let Some(event) = events.recv().await {
      match event {
        WorkerEvent::Fetch { request, reply } => {
          let result = router.route(&request).await;
          if reply.send(result).is_err() {
            debug!("Requester went away before the response arrived");
          }
        }
        WorkerEvent::Sync { tag } => {
          if tag == self.config.sync_tag {
            // Booking data lives in the page context; just wake the pages
            let clients = self.messenger.broadcast(ClientMessage::SyncBookings);
            info!(clients, "Background sync fired, notified page clients");
          } else {
            debug!(tag = %tag, "Ignoring unknown sync tag");
          }
        }
        WorkerEvent::Push(payload) => {
          let notification = render_notification(payload);
          if effects
            .send(WorkerEffect::ShowNotification(notification))
            .is_err()
          {
            warn!("Effects channel closed, dropping notification");
          }
        }
        WorkerEvent::NotificationClick { action, booking_id } => {
          if action == "view" {
            let _ = effects.send(WorkerEffect::OpenWindow(format!(
              "/bookings/{}",
              booking_id
            )));
          }
        }
      }
    }
  }
}

fn render_notification(payload: PushPayload) -> Notification {
  Notification {
    title: payload.title.unwrap_or_else(|| "Booking update".to_string()),
    body: payload
      .body
      .unwrap_or_else(|| "Your booking has been updated".to_string()),
    tag: "booking-update".to_string(),
    booking_id: payload.booking_id.clone(),
    actions: vec![
      NotificationAction {
        action: "view".to_string(),
        title: "View Booking".to_string(),
      },
      NotificationAction {
        action: "dismiss".to_string(),
        title: "Dismiss".to_string(),
      },
    ],
  }
}
