//! Request routing policies for the worker cache layer.
//!
//! Every intercepted request falls into one of four lanes:
//! 1. cacheable API GET — network-first with cached fallback
//! 2. mutating / non-cacheable API — network-only, synthetic offline error
//! 3. navigation — network-first, cached root, then the offline document
//! 4. static asset — cache-first with opportunistic population

use std::sync::Arc;

use color_eyre::Result;
use serde_json::json;
use tracing::debug;

use super::buckets::CacheBuckets;
use super::fetch::Fetch;
use crate::config::WorkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
  Put,
  Delete,
}

/// What kind of resource a request is for, mirroring the runtime's request
/// destination hint. Only images get a substitute on total failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  Document,
  Image,
  #[default]
  Other,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  /// Path plus query, relative to the origin
  pub path: String,
  /// Full-page load (the runtime's "navigate" mode)
  pub navigate: bool,
  pub destination: Destination,
  pub body: Option<Vec<u8>>,
}

impl Request {
  pub fn get(path: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      path: path.into(),
      navigate: false,
      destination: Destination::Other,
      body: None,
    }
  }

  pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
    Self {
      method: Method::Post,
      path: path.into(),
      navigate: false,
      destination: Destination::Other,
      body: Some(body),
    }
  }

  pub fn navigation(path: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      path: path.into(),
      navigate: true,
      destination: Destination::Document,
      body: None,
    }
  }

  pub fn image(path: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      path: path.into(),
      navigate: false,
      destination: Destination::Image,
      body: None,
    }
  }
}

/// A response as seen by the requesting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub content_type: String,
  pub body: Vec<u8>,
}

impl Response {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// The synthetic payload returned when a mutating or uncached API call
  /// fails while offline.
  pub fn offline_error() -> Self {
    let body = json!({
      "error": "Network unavailable",
      "offline": true,
      "message": "This action will be synced when you come back online",
    });
    Self {
      status: 503,
      content_type: "application/json".to_string(),
      body: serde_json::to_vec(&body).unwrap_or_default(),
    }
  }

  /// Built-in last-resort offline page, used when even the precached offline
  /// document is gone.
  pub fn offline_page() -> Self {
    Self {
      status: 503,
      content_type: "text/html".to_string(),
      body: b"<!doctype html><title>Offline</title><p>You are offline.</p>".to_vec(),
    }
  }
}

/// Evaluates the routing policy for each intercepted request.
pub struct Router {
  config: WorkerConfig,
  buckets: Arc<CacheBuckets>,
  network: Arc<dyn Fetch>,
}

impl Router {
  pub fn new(config: WorkerConfig, buckets: Arc<CacheBuckets>, network: Arc<dyn Fetch>) -> Self {
    Self {
      config,
      buckets,
      network,
    }
  }

  fn dynamic_bucket(&self) -> String {
    CacheBuckets::dynamic_name(&self.config.cache_version)
  }

  fn is_cacheable_api(&self, request: &Request) -> bool {
    request.method == Method::Get
      && self
        .config
        .api_cache_paths
        .iter()
        .any(|prefix| request.path.starts_with(prefix.as_str()))
  }

  /// Route one request. The only `Err` lane is a failed fetch for a
  /// non-cacheable, non-navigation, non-image asset.
  pub async fn route(&self, request: &Request) -> Result<Response> {
    if request.path.starts_with("/api/") {
      return self.handle_api(request).await;
    }
    if request.navigate {
      return self.handle_navigation(request).await;
    }
    self.handle_static(request).await
  }

  async fn handle_api(&self, request: &Request) -> Result<Response> {
    if self.is_cacheable_api(request) {
      match self.network.fetch(request).await {
        Ok(response) if response.is_success() => {
          self
            .buckets
            .put(&self.dynamic_bucket(), &request.path, response.clone());
          return Ok(response);
        }
        Ok(response) => {
          // Unhappy status: prefer the last good cached response
          return Ok(self.buckets.lookup(&request.path).unwrap_or(response));
        }
        Err(_) => {
          debug!(path = %request.path, "API fetch failed, trying cache");
          if let Some(cached) = self.buckets.lookup(&request.path) {
            return Ok(cached);
          }
          return Ok(Response::offline_error());
        }
      }
    }

    // Mutating or non-cacheable API: network only, never cached
    match self.network.fetch(request).await {
      Ok(response) => Ok(response),
      Err(_) => Ok(Response::offline_error()),
    }
  }

  async fn handle_navigation(&self, request: &Request) -> Result<Response> {
    match self.network.fetch(request).await {
      Ok(response) => Ok(response),
      Err(_) => {
        debug!(path = %request.path, "Navigation fetch failed, falling back");
        if let Some(root) = self.buckets.lookup(&self.config.root_document) {
          return Ok(root);
        }
        if let Some(offline) = self.buckets.lookup(&self.config.offline_document) {
          return Ok(offline);
        }
        Ok(Response::offline_page())
      }
    }
  }

  async fn handle_static(&self, request: &Request) -> Result<Response> {
    // Cache first
    if let Some(cached) = self.buckets.lookup(&request.path) {
      return Ok(cached);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.is_success() {
          self
            .buckets
            .put(&self.dynamic_bucket(), &request.path, response.clone());
        }
        Ok(response)
      }
      Err(e) => {
        if request.destination == Destination::Image {
          if let Some(placeholder) = self.buckets.lookup(&self.config.placeholder_image) {
            return Ok(placeholder);
          }
        }
        // The one case where failure is surfaced to the requester
        Err(e)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::worker::fetch::testing::FakeNetwork;
  use std::sync::atomic::Ordering;

  fn json_response(body: &str) -> Response {
    Response {
      status: 200,
      content_type: "application/json".to_string(),
      body: body.as_bytes().to_vec(),
    }
  }

  fn html_response(body: &str) -> Response {
    Response {
      status: 200,
      content_type: "text/html".to_string(),
      body: body.as_bytes().to_vec(),
    }
  }

  fn router_with(network: Arc<FakeNetwork>) -> (Router, Arc<CacheBuckets>) {
    let buckets = Arc::new(CacheBuckets::new());
    let router = Router::new(
      crate::config::WorkerConfig::default(),
      Arc::clone(&buckets),
      network,
    );
    (router, buckets)
  }

  #[tokio::test]
  async fn test_cacheable_get_served_from_cache_when_disconnected() {
    let network = Arc::new(FakeNetwork::online());
    network.serve("/api/services", json_response(r#"[{"id":1}]"#));
    let (router, _) = router_with(Arc::clone(&network));

    let request = Request::get("/api/services");
    let first = router.route(&request).await.unwrap();
    assert_eq!(first.body, br#"[{"id":1}]"#.to_vec());

    network.disconnect();
    let second = router.route(&request).await.unwrap();
    assert_eq!(second.body, first.body);
  }

  #[tokio::test]
  async fn test_cacheable_get_without_cache_returns_offline_error() {
    let network = Arc::new(FakeNetwork::online());
    network.disconnect();
    let (router, _) = router_with(network);

    let response = router.route(&Request::get("/api/salons")).await.unwrap();
    assert_eq!(response.status, 503);

    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Network unavailable");
    assert_eq!(body["offline"], true);
  }

  #[tokio::test]
  async fn test_mutating_api_is_never_cached() {
    let network = Arc::new(FakeNetwork::online());
    network.serve("/api/bookings", json_response(r#"{"ok":true}"#));
    let (router, buckets) = router_with(Arc::clone(&network));

    let request = Request::post("/api/bookings", b"{}".to_vec());
    let response = router.route(&request).await.unwrap();
    assert!(response.is_success());
    assert!(buckets.lookup("/api/bookings").is_none());

    network.disconnect();
    let offline = router.route(&request).await.unwrap();
    assert_eq!(offline.status, 503);
    let body: serde_json::Value = serde_json::from_slice(&offline.body).unwrap();
    assert_eq!(
      body["message"],
      "This action will be synced when you come back online"
    );
  }

  #[tokio::test]
  async fn test_uncached_api_get_is_network_only() {
    let network = Arc::new(FakeNetwork::online());
    network.serve("/api/bookings/42", json_response(r#"{"id":42}"#));
    let (router, buckets) = router_with(Arc::clone(&network));

    // /api/bookings is not in the cacheable pattern list
    let response = router.route(&Request::get("/api/bookings/42")).await.unwrap();
    assert!(response.is_success());
    assert!(buckets.lookup("/api/bookings/42").is_none());
  }

  #[tokio::test]
  async fn test_navigation_falls_back_to_cached_root_then_offline_page() {
    let network = Arc::new(FakeNetwork::online());
    network.disconnect();
    let (router, buckets) = router_with(network);

    buckets.put("static-v1", "/", html_response("<html>root</html>"));
    buckets.put("static-v1", "/offline.html", html_response("<html>offline</html>"));

    let request = Request::navigation("/bookings/7");
    let response = router.route(&request).await.unwrap();
    assert_eq!(response.body, b"<html>root</html>".to_vec());

    buckets.delete("static-v1");
    let response = router.route(&request).await.unwrap();
    assert_eq!(response.status, 503);
  }

  #[tokio::test]
  async fn test_navigation_falls_back_to_offline_document() {
    let network = Arc::new(FakeNetwork::online());
    network.disconnect();
    let (router, buckets) = router_with(network);

    buckets.put("static-v1", "/offline.html", html_response("<html>offline</html>"));

    let response = router.route(&Request::navigation("/")).await.unwrap();
    assert_eq!(response.body, b"<html>offline</html>".to_vec());
  }

  #[tokio::test]
  async fn test_static_is_cache_first() {
    let network = Arc::new(FakeNetwork::online());
    let (router, buckets) = router_with(Arc::clone(&network));
    buckets.put("static-v1", "/global.css", html_response("body{}"));

    let response = router.route(&Request::get("/global.css")).await.unwrap();
    assert_eq!(response.body, b"body{}".to_vec());
    assert_eq!(network.hits.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_static_miss_populates_dynamic_cache() {
    let network = Arc::new(FakeNetwork::online());
    network.serve("/app.js", html_response("console.log(1)"));
    let (router, buckets) = router_with(Arc::clone(&network));

    router.route(&Request::get("/app.js")).await.unwrap();
    assert!(buckets.lookup("/app.js").is_some());

    // Second request is served without touching the network again
    network.disconnect();
    let response = router.route(&Request::get("/app.js")).await.unwrap();
    assert_eq!(response.body, b"console.log(1)".to_vec());
  }

  #[tokio::test]
  async fn test_failed_image_gets_placeholder() {
    let network = Arc::new(FakeNetwork::online());
    network.disconnect();
    let (router, buckets) = router_with(network);
    buckets.put(
      "static-v1",
      "/placeholder.svg",
      Response {
        status: 200,
        content_type: "image/svg+xml".to_string(),
        body: b"<svg/>".to_vec(),
      },
    );

    let response = router.route(&Request::image("/photos/salon.jpg")).await.unwrap();
    assert_eq!(response.content_type, "image/svg+xml");
  }

  #[tokio::test]
  async fn test_failed_non_image_asset_propagates() {
    let network = Arc::new(FakeNetwork::online());
    network.disconnect();
    let (router, _) = router_with(network);

    assert!(router.route(&Request::get("/chunk.js")).await.is_err());
  }
}
