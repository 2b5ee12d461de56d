//! Inbound message processing: the keyword-driven opt-in / opt-out /
//! conversational state machine.
//!
//! `decide` runs the state machine against the store and returns a
//! [`Decision`]; [`InboundProcessor::process`] effects it — persists the
//! inbound row, sends the auto-reply, posts the notification, advances the
//! read watermark. Everything after the decision is best-effort: a failed
//! side effect is logged and never poisons the webhook path.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use sanctuary_db::models::{KeywordRow, MessageRow, SubscriberRow};
use sanctuary_db::Database;
use sanctuary_types::domain::{DeliveryStatus, Direction};

use crate::error::{Error, Result};
use crate::gateway::{Notifier, SmsGateway};
use crate::phone;
use crate::router::{self, Intent};
use crate::task::run_blocking;

pub const NOT_SUBSCRIBED_REPLY: &str = "You're not currently subscribed.";
pub const ALREADY_SUBSCRIBED_REPLY: &str =
    "You're already subscribed! Text STOP to unsubscribe.";

/// Notification for the chat sink.
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    /// Existing conversation thread, when the subscriber has one.
    pub thread_ref: Option<String>,
    /// Subscriber to store the returned thread ref on, first-write-wins.
    pub adopt_thread_ref_for: Option<String>,
}

/// What the webhook handler must effect for one inbound message.
/// The inbound row itself is always persisted, independent of intent.
#[derive(Debug, Clone)]
pub struct Decision {
    pub subscriber_id: Option<String>,
    pub auto_reply: Option<String>,
    pub notify: Option<Notification>,
    /// Advance the read watermark after the auto-reply goes out.
    pub mark_read_now: bool,
    /// Conversational message from an active subscriber; drives the
    /// courtesy admin SMS.
    pub conversational: bool,
}

#[derive(Debug, Clone)]
pub struct InboundOptions {
    /// Courtesy-SMS target for conversational messages.
    pub admin_phone: Option<String>,
    pub admin_sms_enabled: bool,
    /// Base URL for conversation deep links.
    pub base_url: String,
}

pub struct InboundProcessor {
    db: Arc<Database>,
    gateway: Arc<dyn SmsGateway>,
    notifier: Arc<dyn Notifier>,
    opts: InboundOptions,
}

impl InboundProcessor {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn SmsGateway>,
        notifier: Arc<dyn Notifier>,
        opts: InboundOptions,
    ) -> Self {
        Self {
            db,
            gateway,
            notifier,
            opts,
        }
    }

    /// Handle one inbound SMS. Returns the auto-reply text, if any, for the
    /// webhook response.
    pub async fn process(&self, from: &str, body: &str) -> Result<Option<String>> {
        let phone = phone::canonicalize(from)?;

        // The inbound row is recorded unconditionally, before the state
        // machine runs. Duplicate webhook deliveries produce duplicate rows;
        // inbound is not deduplicated by provider message id.
        {
            let db = self.db.clone();
            let row = MessageRow {
                id: Uuid::new_v4().to_string(),
                phone_number: phone.clone(),
                content: body.to_string(),
                direction: Direction::Inbound.as_str().to_string(),
                created_at: Utc::now().to_rfc3339(),
                broadcast_id: None,
                provider_message_id: None,
                delivery_status: None,
            };
            run_blocking(move || db.insert_message(&row).map_err(Error::from)).await?;
        }

        let decision = {
            let db = self.db.clone();
            let phone = phone.clone();
            let body = body.to_string();
            run_blocking(move || decide(&db, &phone, &body)).await?
        };

        if let Some(reply) = &decision.auto_reply {
            self.send_and_record_reply(&phone, reply).await;
        }

        if let Some(notification) = &decision.notify {
            self.post_notification(notification).await;
        }

        if decision.conversational {
            self.send_admin_courtesy_sms(&phone, decision.subscriber_id.as_deref())
                .await;
        }

        if decision.mark_read_now {
            if let Some(subscriber_id) = decision.subscriber_id.clone() {
                let db = self.db.clone();
                let now = Utc::now().to_rfc3339();
                let result = run_blocking(move || {
                    db.set_last_read_at(&subscriber_id, Some(&now))
                        .map_err(Error::from)
                })
                .await;
                if let Err(e) = result {
                    warn!(error = %e, "mark_read_failed");
                }
            }
        }

        Ok(decision.auto_reply)
    }

    /// Send the auto-reply and record it as an outbound message row.
    /// Both steps are best-effort.
    async fn send_and_record_reply(&self, phone: &str, reply: &str) {
        let (provider_message_id, delivery_status) =
            match self.gateway.send(phone, reply).await {
                Ok(outcome) => (Some(outcome.provider_id), outcome.initial_status),
                Err(e) => {
                    warn!(to = %phone, error = %e, "auto_reply_send_failed");
                    (None, DeliveryStatus::Failed)
                }
            };

        let db = self.db.clone();
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            phone_number: phone.to_string(),
            content: reply.to_string(),
            direction: Direction::Outbound.as_str().to_string(),
            created_at: Utc::now().to_rfc3339(),
            broadcast_id: None,
            provider_message_id,
            delivery_status: Some(delivery_status.as_str().to_string()),
        };
        let result = run_blocking(move || db.insert_message(&row).map_err(Error::from)).await;
        if let Err(e) = result {
            warn!(error = %e, "auto_reply_record_failed");
        }
    }

    async fn post_notification(&self, notification: &Notification) {
        match self
            .notifier
            .post(&notification.text, notification.thread_ref.as_deref())
            .await
        {
            Ok(thread_ref) => {
                if let Some(subscriber_id) = notification.adopt_thread_ref_for.clone() {
                    let db = self.db.clone();
                    let result = run_blocking(move || {
                        db.set_thread_ref_if_unset(&subscriber_id, &thread_ref)
                            .map_err(Error::from)
                    })
                    .await;
                    if let Err(e) = result {
                        warn!(error = %e, "thread_ref_store_failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "notifier_post_failed"),
        }
    }

    /// Courtesy SMS to the admin with a deep link to the conversation.
    async fn send_admin_courtesy_sms(&self, phone: &str, subscriber_id: Option<&str>) {
        if !self.opts.admin_sms_enabled {
            return;
        }
        let (admin, subscriber_id) = match (&self.opts.admin_phone, subscriber_id) {
            (Some(admin), Some(id)) => (admin.clone(), id),
            _ => return,
        };
        let text = format!(
            "New message from {}. View: {}/conversations/{}",
            phone::format_display(phone),
            self.opts.base_url,
            subscriber_id
        );
        if let Err(e) = self.gateway.send(&admin, &text).await {
            warn!(to = %admin, error = %e, "admin_courtesy_sms_failed");
        }
    }
}

/// The state machine. Subscriber and membership writes happen here;
/// everything in the returned [`Decision`] is effected by the caller.
fn decide(db: &Database, phone: &str, body: &str) -> Result<Decision> {
    let intent = router::route(body, |normalized| {
        db.find_active_keyword(normalized).map_err(Error::from)
    })?;
    let now = Utc::now().to_rfc3339();

    match intent {
        Intent::OptIn(keyword) => {
            let existing = db.find_subscriber_by_phone(phone)?;
            let (subscriber, reply, notify_text) = match existing {
                None => {
                    let row = SubscriberRow {
                        id: Uuid::new_v4().to_string(),
                        phone_number: phone.to_string(),
                        is_active: true,
                        joined_at: now.clone(),
                        last_read_at: None,
                        joined_via_keyword: Some(keyword.keyword.clone()),
                        notifier_thread_ref: None,
                    };
                    let created = db.insert_subscriber(&row)?;
                    let notify = format!(
                        "New subscriber! {} joined via {}",
                        phone::format_display(phone),
                        keyword.keyword
                    );
                    (created, welcome_text(db, &keyword)?, Some(notify))
                }
                Some(s) if s.is_active => {
                    let reply = db
                        .get_app_config()?
                        .legacy_already_subscribed_response
                        .unwrap_or_else(|| ALREADY_SUBSCRIBED_REPLY.to_string());
                    (s, reply, None)
                }
                Some(s) => {
                    db.reactivate_subscriber(&s.id, &keyword.keyword)?;
                    let notify = format!(
                        "{} re-subscribed via {}",
                        phone::format_display(phone),
                        keyword.keyword
                    );
                    (s, welcome_text(db, &keyword)?, Some(notify))
                }
            };

            if let Some(list_id) = &keyword.list_id {
                db.insert_membership(
                    &subscriber.id,
                    list_id,
                    &format!("keyword:{}", keyword.keyword),
                    &now,
                )?;
            }

            Ok(Decision {
                subscriber_id: Some(subscriber.id),
                auto_reply: Some(reply),
                notify: notify_text.map(|text| Notification {
                    text,
                    thread_ref: None,
                    adopt_thread_ref_for: None,
                }),
                mark_read_now: true,
                conversational: false,
            })
        }

        Intent::OptOut => match db.find_subscriber_by_phone(phone)? {
            Some(s) if s.is_active => {
                db.deactivate_subscriber(&s.id)?;
                let reply = format!(
                    "You've been unsubscribed. Text {} to rejoin.",
                    keyword_phrase(db)?
                );
                Ok(Decision {
                    subscriber_id: Some(s.id),
                    auto_reply: Some(reply),
                    notify: Some(Notification {
                        text: format!("{} unsubscribed", phone::format_display(phone)),
                        thread_ref: None,
                        adopt_thread_ref_for: None,
                    }),
                    mark_read_now: false,
                    conversational: false,
                })
            }
            other => Ok(Decision {
                subscriber_id: other.map(|s| s.id),
                auto_reply: Some(NOT_SUBSCRIBED_REPLY.to_string()),
                notify: None,
                mark_read_now: false,
                conversational: false,
            }),
        },

        Intent::Conversational => match db.find_subscriber_by_phone(phone)? {
            Some(s) if s.is_active => {
                let adopt = if s.notifier_thread_ref.is_none() {
                    Some(s.id.clone())
                } else {
                    None
                };
                Ok(Decision {
                    subscriber_id: Some(s.id.clone()),
                    auto_reply: None,
                    notify: Some(Notification {
                        text: format!(
                            "New message from {}: {}",
                            phone::format_display(phone),
                            body
                        ),
                        thread_ref: s.notifier_thread_ref,
                        adopt_thread_ref_for: adopt,
                    }),
                    mark_read_now: false,
                    conversational: true,
                })
            }
            other => {
                let reply = format!("Text {} to subscribe.", keyword_phrase(db)?);
                Ok(Decision {
                    subscriber_id: other.map(|s| s.id),
                    auto_reply: Some(reply),
                    notify: None,
                    mark_read_now: false,
                    conversational: false,
                })
            }
        },
    }
}

/// Keyword auto-response, falling back to the configured default welcome
/// when the keyword's own response is blank.
fn welcome_text(db: &Database, keyword: &KeywordRow) -> Result<String> {
    if !keyword.auto_response.trim().is_empty() {
        return Ok(keyword.auto_response.clone());
    }
    Ok(db.get_app_config()?.default_welcome_message)
}

/// Active keywords joined with " or ", for re-join / subscribe prompts.
/// Falls back to the legacy opt-in keyword when none are active.
fn keyword_phrase(db: &Database) -> Result<String> {
    let texts = db.active_keyword_texts()?;
    if !texts.is_empty() {
        return Ok(texts.join(" or "));
    }
    let config = db.get_app_config()?;
    Ok(config.legacy_opt_in_keyword.unwrap_or_else(|| "JOIN".to_string()))
}
