//! Contracts for everything outside the matching and booking core:
//! persistence, catalog, provider directory, payments, and outbound
//! delivery. Implementations are injected through [`Collaborators`].

pub mod memory;
pub mod outbound;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::address::Address;
use crate::models::booking::{
    Booking, BookingChanges, BookingItem, BookingQuery, BookingStatus, NewBooking,
};
use crate::models::notification::{NewNotification, Notification};
use crate::models::provider::ProviderCandidate;
use crate::models::service::Service;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),
}

/// Runs one collaborator call under a deadline; an elapsed deadline becomes
/// [`CollaboratorError::Timeout`].
pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: &str,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Snapshot of verified, active providers.
    async fn verified_active_providers(&self) -> Result<Vec<ProviderCandidate>, CollaboratorError>;

    async fn get_provider(&self, id: Uuid) -> Result<Option<ProviderCandidate>, CollaboratorError>;

    async fn upsert_provider(&self, provider: ProviderCandidate) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, id: Uuid) -> Result<Option<Service>, CollaboratorError>;
}

#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, CollaboratorError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, CollaboratorError>;

    async fn create_booking_items(
        &self,
        booking_id: Uuid,
        items: &[BookingItem],
    ) -> Result<(), CollaboratorError>;

    /// Compensating delete for a booking whose items never landed.
    async fn delete_booking(&self, booking_id: Uuid) -> Result<(), CollaboratorError>;

    async fn get_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<(Booking, Vec<BookingItem>)>, CollaboratorError>;

    async fn list_customer_bookings(
        &self,
        customer_id: Uuid,
        query: BookingQuery,
    ) -> Result<Vec<Booking>, CollaboratorError>;

    /// Compare-and-set on status, and on the assigned provider when
    /// `changes.expected_provider` is set. Returns
    /// [`CollaboratorError::Conflict`] when either no longer matches.
    async fn update_booking_status(
        &self,
        booking_id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
        changes: BookingChanges,
    ) -> Result<Booking, CollaboratorError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentRequest {
    pub amount_cents: i64,
    pub application_fee_cents: i64,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub booking_id: Uuid,
    pub payment_method_id: String,
}

impl PaymentIntentRequest {
    pub fn for_booking(booking: &Booking) -> Self {
        Self {
            amount_cents: to_cents(booking.total_amount),
            application_fee_cents: to_cents(booking.commission),
            customer_id: booking.customer_id,
            provider_id: booking.provider_id,
            booking_id: booking.id,
            payment_method_id: booking.payment_method_id.clone(),
        }
    }
}

fn to_cents(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;

    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    pub id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, CollaboratorError>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_booking_confirmation(
        &self,
        customer_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), CollaboratorError>;

    async fn send_provider_opportunity(
        &self,
        provider_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, phone: &str, message: &str) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, CollaboratorError>;
}

/// Dependency bundle built once at startup and shared by the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub providers: Arc<dyn ProviderDirectory>,
    pub catalog: Arc<dyn ServiceCatalog>,
    pub addresses: Arc<dyn AddressBook>,
    pub bookings: Arc<dyn BookingStore>,
    pub payments: Arc<dyn PaymentGateway>,
    pub email: Arc<dyn EmailSender>,
    pub sms: Arc<dyn SmsSender>,
    pub notifications: Arc<dyn NotificationStore>,
}

impl Collaborators {
    /// Everything backed by one [`memory::MemoryStore`], with log-only
    /// outbound delivery.
    pub fn in_memory(store: Arc<memory::MemoryStore>) -> Self {
        let outbound = Arc::new(outbound::LogOnlyOutbound);

        Self {
            providers: store.clone(),
            catalog: store.clone(),
            addresses: store.clone(),
            bookings: store.clone(),
            payments: outbound.clone(),
            email: outbound.clone(),
            sms: outbound,
            notifications: store,
        }
    }
}
