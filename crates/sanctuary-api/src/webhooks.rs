//! Provider webhook endpoints.
//!
//! These handlers parse the form payload by hand from the raw body so the
//! signature can be verified over the exact posted parameters. Once past
//! the schema checks, every internal failure is swallowed into an empty
//! 2xx TwiML response — surfacing errors to the provider only triggers
//! retry storms.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

use sanctuary_core::delivery::DeliveryUpdate;
use sanctuary_gateway::signature::verify_webhook_signature;
use sanctuary_types::api::ErrorResponse;

use crate::state::AppState;

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

const TWIML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// POST /api/webhooks/sms
pub async fn inbound_sms(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params: Vec<(String, String)> = match serde_urlencoded::from_bytes(&body) {
        Ok(params) => params,
        Err(_) => return missing_fields(),
    };

    if let Some(rejection) = check_signature(&state, &headers, &params, "/api/webhooks/sms") {
        return rejection;
    }

    let field = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let (from, to, sms_body) = match (field("From"), field("To"), field("Body")) {
        (Some(from), Some(to), Some(body)) => (from, to, body),
        _ => return missing_fields(),
    };

    info!(
        message_sid = field("MessageSid").unwrap_or(""),
        from,
        to,
        body_length = sms_body.len(),
        "sms_webhook_received"
    );

    match state.inbound_processor().process(from, sms_body).await {
        Ok(reply) => twiml(reply.as_deref()),
        Err(e) => {
            // Swallowed by design: the provider gets an empty 2xx either way.
            error!(from, error = %e, "sms_webhook_processing_failed");
            twiml(None)
        }
    }
}

/// POST /api/webhooks/delivery-status — always responds 200 JSON.
pub async fn delivery_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params: Vec<(String, String)> = match serde_urlencoded::from_bytes(&body) {
        Ok(params) => params,
        Err(e) => {
            warn!(error = %e, "delivery_webhook_unparseable");
            return ok_json();
        }
    };

    if let Some(rejection) =
        check_signature(&state, &headers, &params, "/api/webhooks/delivery-status")
    {
        return rejection;
    }

    let field = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.to_string())
    };

    let (provider_message_id, provider_status) = match (field("MessageSid"), field("MessageStatus"))
    {
        (Some(sid), Some(status)) => (sid, status),
        _ => {
            warn!("delivery_webhook_missing_fields");
            return ok_json();
        }
    };

    let update = DeliveryUpdate {
        provider_message_id,
        provider_status,
        error_code: field("ErrorCode"),
        error_message: field("ErrorMessage"),
    };

    if let Err(e) = state.reconciler().apply(update).await {
        error!(error = %e, "delivery_webhook_processing_failed");
    }
    ok_json()
}

/// Verify the provider signature when enabled. Returns the rejection
/// response on failure, None to proceed.
fn check_signature(
    state: &AppState,
    headers: &HeaderMap,
    params: &[(String, String)],
    path: &str,
) -> Option<Response> {
    if !state.config.verify_webhook_signatures {
        return None;
    }
    let auth_token = match &state.config.twilio_auth_token {
        Some(token) => token,
        None => {
            // Verification requested but there is no key to verify with.
            warn!("webhook_signature_verification_unconfigured");
            return None;
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let url = format!("{}{}", state.config.base_url, path);

    if verify_webhook_signature(auth_token, &url, params, signature) {
        None
    } else {
        warn!(path, "webhook_signature_rejected");
        Some(
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Invalid signature".to_string(),
                }),
            )
                .into_response(),
        )
    }
}

fn twiml(reply: Option<&str>) -> Response {
    let body = match reply {
        Some(text) => format!(
            "{TWIML_HEADER}<Response><Message>{}</Message></Response>",
            escape_xml(text)
        ),
        None => format!("{TWIML_HEADER}<Response></Response>"),
    };
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

fn ok_json() -> Response {
    Json(serde_json::json!({ "success": true })).into_response()
}

fn missing_fields() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "Missing required fields".to_string(),
        }),
    )
        .into_response()
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
