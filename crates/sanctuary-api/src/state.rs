use std::sync::Arc;

use sanctuary_core::broadcast::BroadcastEngine;
use sanctuary_core::delivery::DeliveryReconciler;
use sanctuary_core::inbound::{InboundOptions, InboundProcessor};
use sanctuary_core::inbox::InboxProjector;
use sanctuary_core::{Notifier, SmsGateway};
use sanctuary_db::Database;

use crate::config::Config;

pub type AppState = Arc<AppStateInner>;

/// Shared application state. The gateway and notifier are chosen once at
/// startup; handlers assemble the core services from these parts per
/// request.
pub struct AppStateInner {
    pub db: Arc<Database>,
    pub config: Config,
    pub gateway: Arc<dyn SmsGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppStateInner {
    pub fn inbound_processor(&self) -> InboundProcessor {
        InboundProcessor::new(
            self.db.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            InboundOptions {
                admin_phone: self.config.admin_phone_number.clone(),
                admin_sms_enabled: self.config.sms_notifications_enabled,
                base_url: self.config.base_url.clone(),
            },
        )
    }

    pub fn broadcast_engine(&self) -> BroadcastEngine {
        BroadcastEngine::new(
            self.db.clone(),
            self.gateway.clone(),
            self.config.base_url.clone(),
        )
    }

    pub fn inbox(&self) -> InboxProjector {
        InboxProjector::new(self.db.clone())
    }

    pub fn reconciler(&self) -> DeliveryReconciler {
        DeliveryReconciler::new(self.db.clone())
    }
}

/// Run direct repository work off the async runtime. Handlers that go
/// through a core service get this for free; the thin read endpoints use
/// it themselves.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, sanctuary_core::Error>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, sanctuary_core::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| sanctuary_core::Error::Internal(anyhow::anyhow!("blocking task panicked: {e}")))?
}
