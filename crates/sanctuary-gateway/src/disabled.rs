//! Stand-ins wired by the server when provider credentials are absent.
//! Every call fails loudly as a dependency error; there is no silent mock
//! mode. Which implementation to construct is decided once, in main.

use async_trait::async_trait;
use tracing::warn;

use sanctuary_core::error::{Error, Result};
use sanctuary_core::{Notifier, SendOutcome, SmsGateway};

pub struct DisabledGateway;

#[async_trait]
impl SmsGateway for DisabledGateway {
    async fn send(&self, to: &str, _body: &str) -> Result<SendOutcome> {
        warn!(to, "sms_gateway_not_configured");
        Err(Error::dependency("SMS gateway is not configured"))
    }
}

pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn post(&self, _text: &str, _thread_ref: Option<&str>) -> Result<String> {
        warn!("notifier_not_configured");
        Err(Error::dependency("notifier is not configured"))
    }
}
