//! Configuration loaded from environment variables.

use std::env;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path. A `sqlite:` prefix is accepted and stripped.
    pub database_path: String,

    /// Bind address for the HTTP server.
    pub host: String,
    pub port: u16,

    /// Deployment environment label; "production" enables strict defaults.
    pub environment: String,

    /// Static bearer token guarding the admin API. Unset means the admin
    /// surface is open (development only).
    pub admin_token: Option<String>,

    // SMS provider credentials
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_messaging_service_sid: Option<String>,

    // Notifier credentials
    pub slack_bot_token: Option<String>,
    pub slack_channel: Option<String>,

    /// Courtesy-SMS target for conversational inbound messages.
    pub admin_phone_number: Option<String>,
    /// ENABLE_SMS_NOTIFICATIONS != "false"
    pub sms_notifications_enabled: bool,

    /// Base URL minted into short links and deep links.
    pub base_url: String,

    /// Verify inbound webhook signatures. Defaults to on in production.
    pub verify_webhook_signatures: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let environment =
            env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let verify_webhook_signatures = match env::var("VERIFY_WEBHOOK_SIGNATURES") {
            Ok(v) => v != "false",
            Err(_) => environment == "production",
        };

        Config {
            database_path: env::var("DATABASE_URL")
                .map(|url| url.strip_prefix("sqlite:").unwrap_or(&url).to_string())
                .unwrap_or_else(|_| "sanctuary.db".to_string()),

            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),

            environment,

            admin_token: non_empty(env::var("SANCTUARY_ADMIN_TOKEN").ok()),

            twilio_account_sid: non_empty(env::var("TWILIO_ACCOUNT_SID").ok()),
            twilio_auth_token: non_empty(env::var("TWILIO_AUTH_TOKEN").ok()),
            twilio_messaging_service_sid: non_empty(
                env::var("TWILIO_MESSAGING_SERVICE_SID").ok(),
            ),

            slack_bot_token: non_empty(env::var("SLACK_BOT_TOKEN").ok()),
            slack_channel: non_empty(env::var("SLACK_CHANNEL").ok()),

            admin_phone_number: non_empty(env::var("ADMIN_PHONE_NUMBER").ok()),

            sms_notifications_enabled: env::var("ENABLE_SMS_NOTIFICATIONS")
                .map(|v| v != "false")
                .unwrap_or(true),

            base_url: resolve_base_url(),

            verify_webhook_signatures,
        }
    }
}

/// First of the recognized deployment URL variables, falling back to
/// localhost. Host-only values get an https scheme prepended.
fn resolve_base_url() -> String {
    for name in [
        "VERCEL_PROJECT_PRODUCTION_URL",
        "VERCEL_URL",
        "NEXTAUTH_URL",
    ] {
        if let Some(value) = non_empty(env::var(name).ok()) {
            let url = if value.starts_with("http://") || value.starts_with("https://") {
                value
            } else {
                format!("https://{value}")
            };
            return url.trim_end_matches('/').to_string();
        }
    }
    warn!("no deployment URL configured, short links will use localhost");
    "http://localhost:3000".to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
