use serde::{Deserialize, Serialize};

/// Which way a message travelled relative to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INBOUND" => Some(Direction::Inbound),
            "OUTBOUND" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

/// Lifecycle of an outbound message. `Pending` is never persisted — the
/// first stored state is `Sent`; delivery callbacks drive the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Undelivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "PENDING",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Undelivered => "UNDELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(DeliveryStatus::Pending),
            "SENT" => Some(DeliveryStatus::Sent),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            "UNDELIVERED" => Some(DeliveryStatus::Undelivered),
            "FAILED" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }

    /// Map a provider callback status onto the canonical lifecycle.
    /// Unknown statuses return `None` and leave the row untouched.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            "undelivered" => Some(DeliveryStatus::Undelivered),
            "sent" | "queued" | "sending" | "receiving" | "accepted" => {
                Some(DeliveryStatus::Sent)
            }
            _ => None,
        }
    }
}

/// Whether a broadcast target list includes or excludes its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Include,
    Exclude,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Include => "include",
            TargetType::Exclude => "exclude",
        }
    }
}
