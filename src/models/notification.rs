use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingOpportunity,
    BookingUpdate,
    ProviderAssigned,
    BookingAccepted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

/// In-app notification record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ChannelStatus {
    Delivered,
    Failed(String),
    Skipped,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelStatus::Delivered => "delivered",
            ChannelStatus::Failed(_) => "failed",
            ChannelStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub email: ChannelStatus,
    pub in_app: ChannelStatus,
    pub sms: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum NotificationOutcome {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderNotificationResult {
    pub provider_id: Uuid,
    pub outcome: NotificationOutcome,
    /// Absent when the per-provider task died before reporting.
    pub channels: Option<ChannelReport>,
}

/// Aggregate of one fan-out. `successful + failed == total` always holds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FanoutReport {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub per_provider: Vec<ProviderNotificationResult>,
}

impl FanoutReport {
    pub fn from_results(per_provider: Vec<ProviderNotificationResult>) -> Self {
        let successful = per_provider
            .iter()
            .filter(|result| result.outcome == NotificationOutcome::Success)
            .count();

        Self {
            total: per_provider.len(),
            successful,
            failed: per_provider.len() - successful,
            per_provider,
        }
    }
}
