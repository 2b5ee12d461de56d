use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use sanctuary_api::{AppState, AppStateInner, Config};
use sanctuary_core::{Notifier, SmsGateway};
use sanctuary_gateway::disabled::{DisabledGateway, DisabledNotifier};
use sanctuary_gateway::{SlackNotifier, TwilioGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sanctuary=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env();

    if config.admin_token.is_none() && config.environment == "production" {
        eprintln!("FATAL: SANCTUARY_ADMIN_TOKEN is unset in production.");
        eprintln!("       Generate a strong random value: openssl rand -base64 48");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db = Arc::new(sanctuary_db::Database::open(Path::new(&config.database_path))?);

    // Provider wiring is decided here, once. No environment sniffing inside
    // the clients themselves.
    let gateway: Arc<dyn SmsGateway> = match (
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_messaging_service_sid.clone(),
    ) {
        (Some(account_sid), Some(auth_token), Some(service_sid)) => {
            Arc::new(TwilioGateway::new(account_sid, auth_token, service_sid)?)
        }
        _ => {
            warn!("Twilio credentials incomplete; SMS sending is disabled");
            Arc::new(DisabledGateway)
        }
    };

    let notifier: Arc<dyn Notifier> =
        match (config.slack_bot_token.clone(), config.slack_channel.clone()) {
            (Some(bot_token), Some(channel)) => {
                Arc::new(SlackNotifier::new(bot_token, channel)?)
            }
            _ => {
                warn!("Slack credentials incomplete; chat notifications are disabled");
                Arc::new(DisabledNotifier)
            }
        };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        config,
        gateway,
        notifier,
    });

    let app = sanctuary_api::router(state)
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http());

    info!("Sanctuary server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Build a CORS layer for the admin dashboard dev servers. Additional
/// origins can be supplied via the SANCTUARY_CORS_ORIGINS env var
/// (comma-separated list, e.g. "https://admin.my.domain").
fn build_cors_layer() -> CorsLayer {
    let mut origins: Vec<HeaderValue> = vec![
        "http://localhost:3000".parse().unwrap(),
        "http://localhost:5173".parse().unwrap(),
    ];

    if let Ok(extra) = std::env::var("SANCTUARY_CORS_ORIGINS") {
        for raw in extra.split(',') {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                if let Ok(value) = trimmed.parse::<HeaderValue>() {
                    origins.push(value);
                } else {
                    eprintln!("WARNING: ignoring invalid CORS origin: {trimmed}");
                }
            }
        }
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
