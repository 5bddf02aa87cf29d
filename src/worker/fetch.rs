//! The worker's view of the network.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};

use super::router::{Method, Request, Response};

/// Outgoing fetch performed by the worker on behalf of a page request.
#[async_trait]
pub trait Fetch: Send + Sync {
  /// Perform the request against the real network. `Err` means the network
  /// was unreachable; an unhappy status code is still `Ok`.
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// HTTP fetcher against a configured origin.
pub struct HttpFetch {
  client: reqwest::Client,
  origin: String,
}

impl HttpFetch {
  pub fn new(origin: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      origin: origin.into(),
    }
  }
}

#[async_trait]
impl Fetch for HttpFetch {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = format!("{}{}", self.origin.trim_end_matches('/'), request.path);
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Delete => reqwest::Method::DELETE,
    };

    let mut builder = self.client.request(method, &url);
    if let Some(body) = &request.body {
      builder = builder
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("application/octet-stream")
      .to_string();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", url, e))?
      .to_vec();

    Ok(Response {
      status,
      content_type,
      body,
    })
  }
}
