//! Slack chat notifier. Conversational inbound messages thread under the
//! subscriber's existing thread; the first notification establishes it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use sanctuary_core::error::{Error, Result};
use sanctuary_core::Notifier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackNotifier {
    http: Client,
    bot_token: String,
    channel: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(bot_token: String, channel: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::dependency(format!("HTTP client init failed: {e}")))?;
        Ok(Self {
            http,
            bot_token,
            channel,
            api_base: "https://slack.com".to_string(),
        })
    }

    /// Point the client at a stand-in server. Test hook.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, text: &str, thread_ref: Option<&str>) -> Result<String> {
        let payload = PostMessage {
            channel: &self.channel,
            text,
            thread_ts: thread_ref,
        };

        let response = self
            .http
            .post(format!("{}/api/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::dependency(format!("notifier post failed: {e}")))?
            .json::<PostMessageResponse>()
            .await
            .map_err(|e| Error::dependency(format!("notifier response malformed: {e}")))?;

        if !response.ok {
            return Err(Error::dependency(format!(
                "notifier rejected post: {}",
                response.error.as_deref().unwrap_or("unknown")
            )));
        }

        info!(channel = %self.channel, threaded = thread_ref.is_some(), "notifier_posted");

        // Replies stay in the caller's thread; a fresh post starts one.
        match thread_ref {
            Some(existing) => Ok(existing.to_string()),
            None => response
                .ts
                .ok_or_else(|| Error::dependency("notifier response missing ts")),
        }
    }
}
