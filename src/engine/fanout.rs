use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::notification::{
    ChannelReport, ChannelStatus, FanoutReport, NewNotification, NotificationKind,
    NotificationOutcome, ProviderNotificationResult,
};
use crate::models::provider::ProviderCandidate;
use crate::observability::metrics::Metrics;
use crate::services::{
    Collaborators, EmailSender, NotificationStore, SmsSender, with_timeout,
};

/// The booking a fan-out is advertising.
#[derive(Debug, Clone)]
pub struct BookingContext {
    pub booking_id: Uuid,
    pub service_date: DateTime<FixedOffset>,
}

/// Notifies matched providers over email, in-app, and SMS.
///
/// Every provider is handled on its own task and the dispatcher waits for
/// all of them. Email and SMS failures are absorbed; a provider only counts
/// as failed when its in-app record could not be written or its task died.
#[derive(Clone)]
pub struct NotificationDispatcher {
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
    notifications: Arc<dyn NotificationStore>,
    call_timeout: Duration,
    metrics: Metrics,
}

impl NotificationDispatcher {
    pub fn new(collaborators: &Collaborators, call_timeout: Duration, metrics: Metrics) -> Self {
        Self {
            email: collaborators.email.clone(),
            sms: collaborators.sms.clone(),
            notifications: collaborators.notifications.clone(),
            call_timeout,
            metrics,
        }
    }

    pub async fn notify(
        &self,
        candidates: Vec<ProviderCandidate>,
        context: &BookingContext,
    ) -> FanoutReport {
        let (provider_ids, tasks): (Vec<Uuid>, Vec<_>) = candidates
            .into_iter()
            .map(|candidate| {
                let dispatcher = self.clone();
                let context = context.clone();
                let provider_id = candidate.provider_id;
                let task = tokio::spawn(async move {
                    dispatcher.notify_provider(candidate, &context).await
                });
                (provider_id, task)
            })
            .unzip();

        let results = provider_ids
            .into_iter()
            .zip(join_all(tasks).await)
            .map(|(provider_id, joined)| match joined {
                Ok(result) => result,
                Err(err) => {
                    error!(
                        booking_id = %context.booking_id,
                        %provider_id,
                        error = %err,
                        "provider notification task aborted"
                    );
                    ProviderNotificationResult {
                        provider_id,
                        outcome: NotificationOutcome::Failure(format!(
                            "notification task aborted: {err}"
                        )),
                        channels: None,
                    }
                }
            })
            .collect();

        let report = FanoutReport::from_results(results);

        info!(
            booking_id = %context.booking_id,
            total = report.total,
            successful = report.successful,
            failed = report.failed,
            "provider fan-out settled"
        );

        report
    }

    async fn notify_provider(
        &self,
        candidate: ProviderCandidate,
        context: &BookingContext,
    ) -> ProviderNotificationResult {
        let provider_id = candidate.provider_id;
        let booking_id = context.booking_id;

        let email = match with_timeout(
            self.call_timeout,
            "send_provider_opportunity",
            self.email.send_provider_opportunity(provider_id, booking_id),
        )
        .await
        {
            Ok(()) => ChannelStatus::Delivered,
            Err(err) => {
                warn!(%booking_id, %provider_id, channel = "email", error = %err, "provider email failed");
                ChannelStatus::Failed(err.to_string())
            }
        };
        self.record("email", &email);

        let in_app = match with_timeout(
            self.call_timeout,
            "create_notification",
            self.notifications
                .create_notification(opportunity_notification(provider_id, context)),
        )
        .await
        {
            Ok(_) => ChannelStatus::Delivered,
            Err(err) => {
                error!(%booking_id, %provider_id, channel = "in_app", error = %err, "failed to record provider notification");
                ChannelStatus::Failed(err.to_string())
            }
        };
        self.record("in_app", &in_app);

        if let ChannelStatus::Failed(reason) = &in_app {
            return ProviderNotificationResult {
                provider_id,
                outcome: NotificationOutcome::Failure(reason.clone()),
                channels: Some(ChannelReport {
                    email,
                    in_app: in_app.clone(),
                    sms: ChannelStatus::Skipped,
                }),
            };
        }

        let sms = match candidate.wants_sms() {
            None => ChannelStatus::Skipped,
            Some(phone) => {
                let message = format!(
                    "New cleaning job available! Check the app for details. Job ID: {booking_id}"
                );
                match with_timeout(self.call_timeout, "send_sms", self.sms.send_sms(phone, &message))
                    .await
                {
                    Ok(()) => ChannelStatus::Delivered,
                    Err(err) => {
                        warn!(%booking_id, %provider_id, channel = "sms", error = %err, "provider sms failed");
                        ChannelStatus::Failed(err.to_string())
                    }
                }
            }
        };
        self.record("sms", &sms);

        ProviderNotificationResult {
            provider_id,
            outcome: NotificationOutcome::Success,
            channels: Some(ChannelReport { email, in_app, sms }),
        }
    }

    fn record(&self, channel: &str, status: &ChannelStatus) {
        self.metrics
            .provider_notifications_total
            .with_label_values(&[channel, status.label()])
            .inc();
    }
}

fn opportunity_notification(provider_id: Uuid, context: &BookingContext) -> NewNotification {
    NewNotification {
        user_id: provider_id,
        kind: NotificationKind::BookingOpportunity,
        title: "New Booking Opportunity".to_string(),
        message: format!(
            "A new cleaning job is available on {}",
            context.service_date.format("%-m/%-d/%Y")
        ),
        data: json!({ "bookingId": context.booking_id }),
    }
}
