//! Remote booking API seam.
//!
//! The sync engine only ever needs "push this booking, tell me if the remote
//! acknowledged it", so the seam is a single-method trait. The real
//! implementation speaks HTTP; tests substitute scripted fakes.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};

use crate::model::CachedBooking;

/// The remote service a booking is pushed to.
#[async_trait]
pub trait BookingApi: Send + Sync {
  /// Push a booking to the remote. `Ok(())` means the remote acknowledged
  /// the booking's current content; any `Err` counts as a failed attempt.
  ///
  /// The caller does not distinguish a transport error from a remote
  /// rejection; both leave the booking retryable.
  async fn push_booking(&self, booking: &CachedBooking) -> Result<()>;
}

/// HTTP implementation posting bookings to `<base>/api/bookings`.
pub struct HttpBookingApi {
  client: reqwest::Client,
  base_url: String,
}

impl HttpBookingApi {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: base_url.into(),
    }
  }
}

#[async_trait]
impl BookingApi for HttpBookingApi {
  async fn push_booking(&self, booking: &CachedBooking) -> Result<()> {
    let url = format!("{}/api/bookings", self.base_url.trim_end_matches('/'));

    let response = self
      .client
      .post(&url)
      .json(booking)
      .send()
      .await
      .map_err(|e| eyre!("Failed to reach booking API: {}", e))?;

    if !response.status().is_success() {
      return Err(eyre!(
        "Booking API rejected {}: {}",
        booking.id,
        response.status()
      ));
    }

    Ok(())
  }
}
