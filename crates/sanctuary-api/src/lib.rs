//! HTTP surface: axum handlers over the sanctuary-core services, the shared
//! application state, admin authentication, and the router.

pub mod analytics;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod inbox;
pub mod keywords;
pub mod lists;
pub mod middleware;
pub mod redirect;
pub mod router;
pub mod settings;
pub mod state;
pub mod subscribers;
pub mod webhooks;

pub use config::Config;
pub use router::router;
pub use state::{AppState, AppStateInner};
