use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::fanout::{BookingContext, NotificationDispatcher};
use crate::engine::matching::{JobRequest, find_candidates};
use crate::engine::pricing::{PricedBooking, price};
use crate::error::AppError;
use crate::models::booking::{
    Booking, BookingChanges, BookingItem, BookingQuery, BookingRequest, BookingStatus,
    BookingWithItems, NewBooking, ValidatedBookingRequest,
};
use crate::models::notification::{FanoutReport, NewNotification, NotificationKind};
use crate::models::provider::ProviderCandidate;
use crate::observability::metrics::Metrics;
use crate::services::{CollaboratorError, Collaborators, PaymentIntentRequest, with_timeout};

#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    /// Deadline for every individual collaborator call.
    pub call_timeout: Duration,
    pub default_duration_minutes: u32,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            default_duration_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SideStepOutcome {
    Completed,
    Failed { reason: String },
}

impl SideStepOutcome {
    fn label(&self) -> &'static str {
        match self {
            SideStepOutcome::Completed => "completed",
            SideStepOutcome::Failed { .. } => "failed",
        }
    }
}

/// What happened to the best-effort work issued after a booking was stored.
#[derive(Debug, Clone, Serialize)]
pub struct SideStepReport {
    pub payment_intent: SideStepOutcome,
    pub customer_confirmation: SideStepOutcome,
    pub provider_fanout: SideStepOutcome,
    pub fanout: Option<FanoutReport>,
}

impl SideStepReport {
    pub fn warnings(&self) -> Vec<String> {
        [
            ("payment_intent", &self.payment_intent),
            ("customer_confirmation", &self.customer_confirmation),
            ("provider_fanout", &self.provider_fanout),
        ]
        .into_iter()
        .filter_map(|(step, outcome)| match outcome {
            SideStepOutcome::Completed => None,
            SideStepOutcome::Failed { reason } => Some(format!("{step}: {reason}")),
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCreated {
    #[serde(flatten)]
    pub booking: BookingWithItems,
    pub side_steps: SideStepReport,
    pub warnings: Vec<String>,
}

/// Owns the booking state machine: creation with compensating rollback, the
/// best-effort follow-up steps, and every later status transition.
#[derive(Clone)]
pub struct BookingOrchestrator {
    collaborators: Collaborators,
    dispatcher: NotificationDispatcher,
    settings: LifecycleSettings,
    metrics: Metrics,
}

impl BookingOrchestrator {
    pub fn new(collaborators: Collaborators, settings: LifecycleSettings, metrics: Metrics) -> Self {
        let dispatcher =
            NotificationDispatcher::new(&collaborators, settings.call_timeout, metrics.clone());

        Self {
            collaborators,
            dispatcher,
            settings,
            metrics,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        with_timeout(self.settings.call_timeout, operation, call).await
    }

    pub async fn create_booking(
        &self,
        customer_id: Uuid,
        request: BookingRequest,
    ) -> Result<BookingCreated, AppError> {
        let started = Instant::now();
        let result = self.create_booking_inner(customer_id, request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::Validation(_)) | Err(AppError::ServiceNotFound(_)) => "rejected",
            Err(_) => "error",
        };
        self.metrics
            .booking_creation_latency_seconds
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
        self.metrics
            .bookings_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn create_booking_inner(
        &self,
        customer_id: Uuid,
        request: BookingRequest,
    ) -> Result<BookingCreated, AppError> {
        let request = request.validate().map_err(AppError::Validation)?;
        let priced = self.price_request(&request).await?;

        let new_booking = NewBooking {
            customer_id,
            address_id: request.address_id,
            service_date: request.service_date,
            duration_minutes: self.settings.default_duration_minutes,
            subtotal: priced.breakdown.subtotal,
            commission: priced.breakdown.commission,
            processing_fee: priced.breakdown.processing_fee,
            discount_amount: Decimal::ZERO,
            total_amount: priced.breakdown.total,
            special_instructions: request.special_instructions,
            home_details: request.home_details,
            recurring_frequency: request.recurring_frequency,
            payment_method_id: request.payment_method_id,
        };

        let booking = self
            .call(
                "create_booking",
                self.collaborators.bookings.create_booking(new_booking),
            )
            .await
            .map_err(|err| {
                error!(%customer_id, error = %err, "failed to create booking");
                AppError::Persistence(format!("failed to create booking: {err}"))
            })?;

        if let Err(err) = self
            .call(
                "create_booking_items",
                self.collaborators
                    .bookings
                    .create_booking_items(booking.id, &priced.items),
            )
            .await
        {
            error!(booking_id = %booking.id, error = %err, "failed to create booking items; rolling back booking");

            if let Err(rollback_err) = self
                .call(
                    "delete_booking",
                    self.collaborators.bookings.delete_booking(booking.id),
                )
                .await
            {
                error!(
                    booking_id = %booking.id,
                    error = %rollback_err,
                    "compensating delete failed; booking row may be orphaned"
                );
            }

            return Err(AppError::Persistence(format!(
                "failed to create booking items: {err}"
            )));
        }

        info!(
            booking_id = %booking.id,
            %customer_id,
            total = %booking.total_amount,
            items = priced.items.len(),
            "booking created"
        );

        let (booking, side_steps) = self.run_side_steps(booking).await;
        let warnings = side_steps.warnings();

        Ok(BookingCreated {
            booking: BookingWithItems {
                booking,
                booking_items: priced.items,
            },
            side_steps,
            warnings,
        })
    }

    async fn price_request(
        &self,
        request: &ValidatedBookingRequest,
    ) -> Result<PricedBooking, AppError> {
        let mut catalog = HashMap::new();

        for line in &request.services {
            if catalog.contains_key(&line.service_id) {
                continue;
            }

            let service = self
                .call(
                    "get_service",
                    self.collaborators.catalog.get_service(line.service_id),
                )
                .await
                .map_err(|err| {
                    AppError::Persistence(format!(
                        "catalog lookup for {} failed: {err}",
                        line.service_id
                    ))
                })?
                .ok_or(AppError::ServiceNotFound(line.service_id))?;

            catalog.insert(line.service_id, service);
        }

        price(
            |id| catalog.get(&id).cloned(),
            &request.home_details,
            &request.services,
        )
    }

    /// Issues payment, customer confirmation, and provider fan-out together.
    /// None of them can fail the booking.
    async fn run_side_steps(&self, booking: Booking) -> (Booking, SideStepReport) {
        let (payment, confirmation, fanout) = tokio::join!(
            self.payment_step(&booking),
            self.confirmation_step(&booking),
            self.provider_fanout_step(&booking),
        );

        let (payment_intent, updated) = self.settle("payment_intent", booking.id, payment);
        let (customer_confirmation, _) =
            self.settle("customer_confirmation", booking.id, confirmation);
        let (provider_fanout, fanout) = self.settle("provider_fanout", booking.id, fanout);

        (
            updated.unwrap_or(booking),
            SideStepReport {
                payment_intent,
                customer_confirmation,
                provider_fanout,
                fanout,
            },
        )
    }

    fn settle<T>(
        &self,
        step: &str,
        booking_id: Uuid,
        result: Result<T, String>,
    ) -> (SideStepOutcome, Option<T>) {
        let (outcome, value) = match result {
            Ok(value) => (SideStepOutcome::Completed, Some(value)),
            Err(reason) => {
                warn!(%booking_id, step, reason = %reason, "booking side step failed");
                (SideStepOutcome::Failed { reason }, None)
            }
        };

        self.metrics
            .booking_side_steps_total
            .with_label_values(&[step, outcome.label()])
            .inc();

        (outcome, value)
    }

    async fn payment_step(&self, booking: &Booking) -> Result<Booking, String> {
        let intent = self
            .call(
                "create_payment_intent",
                self.collaborators
                    .payments
                    .create_payment_intent(PaymentIntentRequest::for_booking(booking)),
            )
            .await
            .map_err(|err| format!("payment intent creation failed: {err}"))?;

        self.call(
            "update_booking_status",
            self.collaborators.bookings.update_booking_status(
                booking.id,
                BookingStatus::Pending,
                BookingStatus::PaymentPending,
                BookingChanges {
                    payment_intent_id: Some(intent.id),
                    ..Default::default()
                },
            ),
        )
        .await
        .map_err(|err| format!("could not move booking to payment_pending: {err}"))
    }

    async fn confirmation_step(&self, booking: &Booking) -> Result<(), String> {
        self.call(
            "send_booking_confirmation",
            self.collaborators
                .email
                .send_booking_confirmation(booking.customer_id, booking.id),
        )
        .await
        .map_err(|err| format!("confirmation email failed: {err}"))
    }

    async fn provider_fanout_step(&self, booking: &Booking) -> Result<FanoutReport, String> {
        let address = self
            .call(
                "get_address",
                self.collaborators.addresses.get_address(booking.address_id),
            )
            .await
            .map_err(|err| format!("address lookup failed: {err}"))?
            .ok_or_else(|| format!("address {} not found", booking.address_id))?;

        let pool = self
            .call(
                "verified_active_providers",
                self.collaborators.providers.verified_active_providers(),
            )
            .await
            .map_err(|err| format!("provider lookup failed: {err}"))?;

        let job = JobRequest::for_booking(booking, address.location);
        let candidates = self.match_from_pool(&job, &pool);

        let context = BookingContext {
            booking_id: booking.id,
            service_date: booking.service_date,
        };

        Ok(self.dispatcher.notify(candidates, &context).await)
    }

    fn match_from_pool(&self, job: &JobRequest, pool: &[ProviderCandidate]) -> Vec<ProviderCandidate> {
        let candidates = find_candidates(job, pool);
        self.metrics
            .matched_providers
            .observe(candidates.len() as f64);
        candidates
    }

    /// Eligible providers for an ad-hoc job.
    pub async fn match_providers(&self, job: &JobRequest) -> Result<Vec<ProviderCandidate>, AppError> {
        let pool = self
            .call(
                "verified_active_providers",
                self.collaborators.providers.verified_active_providers(),
            )
            .await?;

        Ok(self.match_from_pool(job, &pool))
    }

    /// Re-runs matching and fan-out for an existing booking.
    pub async fn notify_available_providers(
        &self,
        booking_id: Uuid,
    ) -> Result<FanoutReport, AppError> {
        let (booking, _) = self.load(booking_id).await?;

        if booking.provider_id.is_some() || booking.status.is_terminal() {
            return Err(AppError::BadRequest(format!(
                "booking {booking_id} is no longer open to providers"
            )));
        }

        self.provider_fanout_step(&booking)
            .await
            .map_err(AppError::Internal)
    }

    async fn load(&self, booking_id: Uuid) -> Result<(Booking, Vec<BookingItem>), AppError> {
        self.call(
            "get_booking",
            self.collaborators.bookings.get_booking(booking_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))
    }

    /// Bookings are visible to their customer and their assigned provider.
    pub async fn get_booking(
        &self,
        requester: Uuid,
        booking_id: Uuid,
    ) -> Result<BookingWithItems, AppError> {
        let (booking, booking_items) = self.load(booking_id).await?;

        if booking.customer_id != requester && booking.provider_id != Some(requester) {
            return Err(AppError::NotFound(format!("booking {booking_id} not found")));
        }

        Ok(BookingWithItems {
            booking,
            booking_items,
        })
    }

    pub async fn list_bookings(
        &self,
        customer_id: Uuid,
        query: BookingQuery,
    ) -> Result<Vec<Booking>, AppError> {
        if query.page == 0 {
            return Err(AppError::BadRequest("page must be at least 1".to_string()));
        }
        if query.limit == 0 || query.limit > BookingQuery::MAX_LIMIT {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                BookingQuery::MAX_LIMIT
            )));
        }

        Ok(self
            .call(
                "list_customer_bookings",
                self.collaborators
                    .bookings
                    .list_customer_bookings(customer_id, query),
            )
            .await?)
    }

    pub async fn confirm_payment(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        let (booking, _) = self.load(booking_id).await?;
        self.transition(&booking, BookingStatus::Confirmed, BookingChanges::default())
            .await
    }

    pub async fn assign_provider(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Booking, AppError> {
        let (booking, _) = self.load(booking_id).await?;

        if !booking.status.accepts_assignment() {
            return Err(AppError::BadRequest(format!(
                "booking {booking_id} is {} and cannot take a provider",
                booking.status
            )));
        }
        if let Some(existing) = booking.provider_id {
            return Err(AppError::Conflict(format!(
                "booking {booking_id} is already assigned to {existing}"
            )));
        }

        let provider = self
            .call(
                "get_provider",
                self.collaborators.providers.get_provider(provider_id),
            )
            .await?
            .filter(ProviderCandidate::is_eligible)
            .ok_or_else(|| {
                AppError::NotFound(format!("provider {provider_id} is not available for work"))
            })?;

        let updated = self
            .call(
                "update_booking_status",
                self.collaborators.bookings.update_booking_status(
                    booking.id,
                    booking.status,
                    booking.status,
                    BookingChanges {
                        expected_provider: Some(None),
                        provider_id: Some(provider_id),
                        assigned_at: Some(Utc::now()),
                        ..Default::default()
                    },
                ),
            )
            .await?;

        info!(%booking_id, %provider_id, "provider assigned");

        self.best_effort_notification(NewNotification {
            user_id: updated.customer_id,
            kind: NotificationKind::ProviderAssigned,
            title: "Cleaner Assigned".to_string(),
            message: format!(
                "{} has been assigned to your booking",
                provider.business_name
            ),
            data: json!({ "bookingId": booking_id, "providerId": provider_id }),
        })
        .await;
        self.best_effort_notification(NewNotification {
            user_id: provider_id,
            kind: NotificationKind::BookingAccepted,
            title: "Booking Confirmed".to_string(),
            message: format!(
                "You've been assigned a cleaning job on {}",
                updated.service_date.format("%-m/%-d/%Y")
            ),
            data: json!({ "bookingId": booking_id }),
        })
        .await;

        Ok(updated)
    }

    pub async fn start_booking(&self, booking_id: Uuid, provider_id: Uuid) -> Result<Booking, AppError> {
        let (booking, _) = self.load(booking_id).await?;
        ensure_assigned_to(&booking, provider_id)?;

        self.transition(
            &booking,
            BookingStatus::InProgress,
            BookingChanges {
                started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn complete_booking(
        &self,
        booking_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Booking, AppError> {
        let (booking, _) = self.load(booking_id).await?;
        ensure_assigned_to(&booking, provider_id)?;

        self.transition(
            &booking,
            BookingStatus::Completed,
            BookingChanges {
                completed_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    /// Customers and the assigned provider may cancel until completion.
    pub async fn cancel_booking(
        &self,
        requester: Uuid,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, AppError> {
        let (booking, _) = self.load(booking_id).await?;

        if booking.customer_id != requester && booking.provider_id != Some(requester) {
            return Err(AppError::NotFound(format!("booking {booking_id} not found")));
        }

        self.transition(
            &booking,
            BookingStatus::Cancelled,
            BookingChanges {
                cancelled_at: Some(Utc::now()),
                cancellation_reason: reason.filter(|text| !text.trim().is_empty()),
                ..Default::default()
            },
        )
        .await
    }

    async fn transition(
        &self,
        booking: &Booking,
        next: BookingStatus,
        changes: BookingChanges,
    ) -> Result<Booking, AppError> {
        if !booking.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: booking.status,
                to: next,
            });
        }

        let updated = self
            .call(
                "update_booking_status",
                self.collaborators.bookings.update_booking_status(
                    booking.id,
                    booking.status,
                    next,
                    changes,
                ),
            )
            .await?;

        info!(booking_id = %booking.id, from = %booking.status, to = %next, "booking status changed");

        self.best_effort_notification(NewNotification {
            user_id: updated.customer_id,
            kind: NotificationKind::BookingUpdate,
            title: format!("Booking {}", status_title(next)),
            message: status_message(&updated),
            data: json!({ "bookingId": updated.id, "status": next }),
        })
        .await;

        Ok(updated)
    }

    async fn best_effort_notification(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        let kind = notification.kind;

        if let Err(err) = self
            .call(
                "create_notification",
                self.collaborators
                    .notifications
                    .create_notification(notification),
            )
            .await
        {
            warn!(%user_id, ?kind, channel = "in_app", error = %err, "status notification failed");
        }
    }
}

fn ensure_assigned_to(booking: &Booking, provider_id: Uuid) -> Result<(), AppError> {
    match booking.provider_id {
        Some(assigned) if assigned == provider_id => Ok(()),
        Some(_) => Err(AppError::NotFound(format!(
            "booking {} not found",
            booking.id
        ))),
        None => Err(AppError::BadRequest(format!(
            "booking {} has no provider assigned",
            booking.id
        ))),
    }
}

fn status_title(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "Pending",
        BookingStatus::PaymentPending => "Awaiting Payment",
        BookingStatus::Confirmed => "Confirmed",
        BookingStatus::InProgress => "In Progress",
        BookingStatus::Completed => "Completed",
        BookingStatus::Cancelled => "Cancelled",
    }
}

fn status_message(booking: &Booking) -> String {
    let date = booking.service_date.format("%-m/%-d/%Y");
    match booking.status {
        BookingStatus::Confirmed => format!("Your cleaning on {date} is confirmed"),
        BookingStatus::InProgress => format!("Your cleaning on {date} has started"),
        BookingStatus::Completed => format!("Your cleaning on {date} is complete"),
        BookingStatus::Cancelled => match &booking.cancellation_reason {
            Some(reason) => format!("Your cleaning on {date} was cancelled: {reason}"),
            None => format!("Your cleaning on {date} was cancelled"),
        },
        other => format!("Your cleaning on {date} is now {other}"),
    }
}
