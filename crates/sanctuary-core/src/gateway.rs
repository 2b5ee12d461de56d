//! Provider seams. The telephony gateway and chat notifier are injected
//! behind these traits; production wires the REST clients from
//! sanctuary-gateway, tests wire recording fakes.

use async_trait::async_trait;

use sanctuary_types::domain::DeliveryStatus;

use crate::error::Result;

/// What the provider reported back for one accepted send.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub provider_id: String,
    pub initial_status: DeliveryStatus,
}

#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send one SMS. `to` is a canonical `+1XXXXXXXXXX` number.
    async fn send(&self, to: &str, body: &str) -> Result<SendOutcome>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post a notice, threaded under `thread_ref` when given. Returns the
    /// thread reference the message landed in — the existing one when
    /// supplied, otherwise a new reference callers may persist.
    async fn post(&self, text: &str, thread_ref: Option<&str>) -> Result<String>;
}
