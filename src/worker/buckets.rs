//! Versioned response buckets, the worker-side cache storage.
//!
//! Buckets outlive any single worker instance: a respawned worker reattaches
//! to the same storage, re-precaches, and prunes buckets left behind by
//! older builds.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use super::router::Response;

/// Named response buckets keyed by exact request path.
#[derive(Default)]
pub struct CacheBuckets {
  buckets: Mutex<HashMap<String, HashMap<String, Response>>>,
}

impl CacheBuckets {
  pub fn new() -> Self {
    Self::default()
  }

  /// Bucket name for precached static assets of a build.
  pub fn static_name(version: &str) -> String {
    format!("static-{}", version)
  }

  /// Bucket name for the dynamic cache of a build.
  pub fn dynamic_name(version: &str) -> String {
    format!("dynamic-{}", version)
  }

  /// Store a response, creating the bucket if needed.
  pub fn put(&self, bucket: &str, key: &str, response: Response) {
    let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
    buckets
      .entry(bucket.to_string())
      .or_default()
      .insert(key.to_string(), response);
  }

  /// Look up an exact key across all buckets.
  pub fn lookup(&self, key: &str) -> Option<Response> {
    let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
    buckets.values().find_map(|bucket| bucket.get(key).cloned())
  }

  /// Delete a whole bucket. Returns whether it existed.
  pub fn delete(&self, bucket: &str) -> bool {
    let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
    let existed = buckets.remove(bucket).is_some();
    if existed {
      debug!(bucket, "Deleted cache bucket");
    }
    existed
  }

  /// Names of all existing buckets.
  pub fn names(&self) -> Vec<String> {
    let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
    buckets.keys().cloned().collect()
  }
}
