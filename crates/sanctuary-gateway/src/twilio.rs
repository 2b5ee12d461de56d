//! Twilio REST client for outbound SMS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use sanctuary_core::error::{Error, Result};
use sanctuary_core::{SendOutcome, SmsGateway};
use sanctuary_types::domain::DeliveryStatus;

/// Per-call ceiling; a hung provider request must not stall the fan-out.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TwilioGateway {
    http: Client,
    account_sid: String,
    auth_token: String,
    messaging_service_sid: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioGateway {
    pub fn new(
        account_sid: String,
        auth_token: String,
        messaging_service_sid: String,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::dependency(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            http,
            account_sid,
            auth_token,
            messaging_service_sid,
            api_base: "https://api.twilio.com".to_string(),
        })
    }

    /// Point the client at a stand-in server. Test hook.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SendOutcome> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let params = [
            ("To", to),
            ("Body", body),
            ("MessagingServiceSid", self.messaging_service_sid.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::dependency(format!("SMS send failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiError>()
                .await
                .ok()
                .and_then(|e| {
                    e.message
                        .map(|m| format!("{m} (code {})", e.code.unwrap_or(0)))
                })
                .unwrap_or_else(|| format!("HTTP {status}"));
            warn!(to, %status, %detail, "twilio_send_rejected");
            return Err(Error::dependency(format!("SMS send rejected: {detail}")));
        }

        let created: MessageCreated = response
            .json()
            .await
            .map_err(|e| Error::dependency(format!("SMS response malformed: {e}")))?;

        info!(to, provider_id = %created.sid, status = %created.status, "sms_sent");

        Ok(SendOutcome {
            initial_status: DeliveryStatus::from_provider(&created.status)
                .unwrap_or(DeliveryStatus::Sent),
            provider_id: created.sid,
        })
    }
}
