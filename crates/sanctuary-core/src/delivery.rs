//! Delivery-status reconciliation: provider callbacks → outbound message
//! rows, keyed by provider message id.

use std::sync::Arc;

use tracing::{info, warn};

use sanctuary_db::Database;
use sanctuary_types::domain::DeliveryStatus;

use crate::error::{Error, Result};
use crate::task::run_blocking;

#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
    pub provider_message_id: String,
    pub provider_status: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

pub struct DeliveryReconciler {
    db: Arc<Database>,
}

impl DeliveryReconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Apply one callback. Unknown provider ids succeed silently — the
    /// message may predate tracking. Unknown statuses are logged and
    /// ignored.
    pub async fn apply(&self, update: DeliveryUpdate) -> Result<()> {
        if let Some(code) = &update.error_code {
            warn!(
                provider_message_id = %update.provider_message_id,
                error_code = %code,
                error_message = update.error_message.as_deref().unwrap_or(""),
                "delivery_error_reported"
            );
        }

        let status = match DeliveryStatus::from_provider(&update.provider_status) {
            Some(status) => status,
            None => {
                warn!(
                    provider_message_id = %update.provider_message_id,
                    provider_status = %update.provider_status,
                    "delivery_status_unrecognized"
                );
                return Ok(());
            }
        };

        let db = self.db.clone();
        let provider_id = update.provider_message_id.clone();
        let updated = run_blocking(move || {
            db.set_delivery_status(&provider_id, status.as_str())
                .map_err(Error::from)
        })
        .await?;

        if updated {
            info!(
                provider_message_id = %update.provider_message_id,
                status = status.as_str(),
                "delivery_status_updated"
            );
        }
        Ok(())
    }
}
