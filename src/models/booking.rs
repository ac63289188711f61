use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FieldError;
use crate::models::service::HomeDetails;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    PaymentPending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::PaymentPending => "payment_pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Forward edges of the lifecycle plus cancellation from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (Pending, PaymentPending)
            | (PaymentPending, Confirmed)
            | (Confirmed, InProgress)
            | (InProgress, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// States in which a provider may still be attached to the booking.
    pub fn accepts_assignment(self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::PaymentPending | BookingStatus::Confirmed
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringFrequency {
    Weekly,
    BiWeekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub address_id: Uuid,
    /// Wall-clock time at the job site, with the offset it was booked in.
    pub service_date: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub processing_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub special_instructions: Option<String>,
    pub home_details: HomeDetails,
    pub recurring_frequency: Option<RecurringFrequency>,
    pub payment_method_id: String,
    pub payment_intent_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row handed to the store; id and timestamps are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: Uuid,
    pub address_id: Uuid,
    pub service_date: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub subtotal: Decimal,
    pub commission: Decimal,
    pub processing_fee: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub special_instructions: Option<String>,
    pub home_details: HomeDetails,
    pub recurring_frequency: Option<RecurringFrequency>,
    pub payment_method_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingItem {
    pub service_id: Uuid,
    /// Catalog name at booking time.
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

/// Fields written alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    /// When set, the stored `provider_id` must equal this value for the write
    /// to land. `Some(None)` means "still unassigned".
    pub expected_provider: Option<Option<Uuid>>,
    pub provider_id: Option<Uuid>,
    pub payment_intent_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl BookingChanges {
    pub fn precondition_holds(&self, booking: &Booking) -> bool {
        self.expected_provider
            .is_none_or(|expected| booking.provider_id == expected)
    }

    pub fn apply(self, booking: &mut Booking) {
        if let Some(provider_id) = self.provider_id {
            booking.provider_id = Some(provider_id);
        }
        if let Some(payment_intent_id) = self.payment_intent_id {
            booking.payment_intent_id = Some(payment_intent_id);
        }
        if let Some(at) = self.assigned_at {
            booking.assigned_at = Some(at);
        }
        if let Some(at) = self.started_at {
            booking.started_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            booking.completed_at = Some(at);
        }
        if let Some(at) = self.cancelled_at {
            booking.cancelled_at = Some(at);
        }
        if let Some(reason) = self.cancellation_reason {
            booking.cancellation_reason = Some(reason);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingWithItems {
    #[serde(flatten)]
    pub booking: Booking,
    pub booking_items: Vec<BookingItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    pub page: u32,
    pub limit: u32,
}

impl BookingQuery {
    pub const MAX_LIMIT: u32 = 50;

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

impl Default for BookingQuery {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSelection {
    #[serde(default)]
    pub service_id: String,
    #[serde(default)]
    pub quantity: i64,
}

/// Booking request as received from a client, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub address_id: String,
    #[serde(default)]
    pub service_date: String,
    #[serde(default)]
    pub services: Vec<ServiceSelection>,
    pub home_details: Option<HomeDetails>,
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub payment_method_id: String,
    pub recurring_frequency: Option<RecurringFrequency>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedService {
    pub service_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct ValidatedBookingRequest {
    pub address_id: Uuid,
    pub service_date: DateTime<FixedOffset>,
    pub services: Vec<RequestedService>,
    pub home_details: HomeDetails,
    pub special_instructions: Option<String>,
    pub payment_method_id: String,
    pub recurring_frequency: Option<RecurringFrequency>,
}

const MIN_SQUARE_FOOTAGE: u32 = 100;

impl BookingRequest {
    /// Checks the request shape, collecting every field problem rather than
    /// stopping at the first.
    pub fn validate(self) -> Result<ValidatedBookingRequest, Vec<FieldError>> {
        let mut errors = Vec::new();

        let address_id = parse_reference(&self.address_id, "addressId", "address", &mut errors);

        let service_date = if self.service_date.trim().is_empty() {
            errors.push(FieldError::new("serviceDate", "service date is required"));
            None
        } else {
            match DateTime::parse_from_rfc3339(self.service_date.trim()) {
                Ok(date) => Some(date),
                Err(err) => {
                    errors.push(FieldError::new(
                        "serviceDate",
                        format!("service date must be an RFC 3339 timestamp: {err}"),
                    ));
                    None
                }
            }
        };

        if self.services.is_empty() {
            errors.push(FieldError::new(
                "services",
                "at least one service is required",
            ));
        }

        let mut services = Vec::with_capacity(self.services.len());
        for (index, selection) in self.services.iter().enumerate() {
            let service_id = parse_reference(
                &selection.service_id,
                &format!("services[{index}].serviceId"),
                "service",
                &mut errors,
            );

            let quantity = match u32::try_from(selection.quantity) {
                Ok(quantity) if quantity > 0 => Some(quantity),
                _ => {
                    errors.push(FieldError::new(
                        format!("services[{index}].quantity"),
                        "quantity must be a positive integer",
                    ));
                    None
                }
            };

            if let (Some(service_id), Some(quantity)) = (service_id, quantity) {
                services.push(RequestedService {
                    service_id,
                    quantity,
                });
            }
        }

        match &self.home_details {
            Some(home) => validate_home_details(home, &mut errors),
            None => errors.push(FieldError::new("homeDetails", "home details are required")),
        }

        if self.payment_method_id.trim().is_empty() {
            errors.push(FieldError::new(
                "paymentMethodId",
                "payment method is required",
            ));
        }

        match (address_id, service_date, self.home_details) {
            (Some(address_id), Some(service_date), Some(home_details)) if errors.is_empty() => {
                Ok(ValidatedBookingRequest {
                    address_id,
                    service_date,
                    services,
                    home_details,
                    special_instructions: self
                        .special_instructions
                        .filter(|text| !text.trim().is_empty()),
                    payment_method_id: self.payment_method_id.trim().to_string(),
                    recurring_frequency: self.recurring_frequency,
                })
            }
            _ => Err(errors),
        }
    }
}

fn parse_reference(
    raw: &str,
    field: &str,
    what: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Uuid> {
    if raw.trim().is_empty() {
        errors.push(FieldError::new(field, format!("{what} is required")));
        return None;
    }

    match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push(FieldError::new(field, format!("{what} id is not a valid id")));
            None
        }
    }
}

fn validate_home_details(home: &HomeDetails, errors: &mut Vec<FieldError>) {
    if home.bedrooms < 1 {
        errors.push(FieldError::new(
            "homeDetails.bedrooms",
            "at least 1 bedroom is required",
        ));
    }
    if home.bathrooms < 1 {
        errors.push(FieldError::new(
            "homeDetails.bathrooms",
            "at least 1 bathroom is required",
        ));
    }
    if home.square_footage < MIN_SQUARE_FOOTAGE {
        errors.push(FieldError::new(
            "homeDetails.squareFootage",
            format!("square footage must be at least {MIN_SQUARE_FOOTAGE}"),
        ));
    }
    if home.floors < 1 {
        errors.push(FieldError::new(
            "homeDetails.floors",
            "at least 1 floor is required",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> HomeDetails {
        HomeDetails {
            bedrooms: 3,
            bathrooms: 2,
            square_footage: 1000,
            floors: 1,
            pets: false,
            pet_details: None,
            access_instructions: None,
        }
    }

    fn request() -> BookingRequest {
        BookingRequest {
            address_id: Uuid::from_u128(1).to_string(),
            service_date: "2030-06-03T10:00:00-05:00".to_string(),
            services: vec![ServiceSelection {
                service_id: Uuid::from_u128(2).to_string(),
                quantity: 1,
            }],
            home_details: Some(home()),
            special_instructions: Some("  ".to_string()),
            payment_method_id: "pm_card_visa".to_string(),
            recurring_frequency: None,
        }
    }

    fn fields(errors: &[FieldError]) -> Vec<&str> {
        errors.iter().map(|error| error.field.as_str()).collect()
    }

    #[test]
    fn valid_request_keeps_wall_clock_offset() {
        let validated = request().validate().unwrap();

        assert_eq!(validated.services.len(), 1);
        assert_eq!(validated.service_date.offset().local_minus_utc(), -5 * 3600);
        assert!(validated.special_instructions.is_none());
    }

    #[test]
    fn empty_service_list_is_rejected() {
        let mut req = request();
        req.services.clear();

        let errors = req.validate().unwrap_err();
        assert_eq!(fields(&errors), vec!["services"]);
    }

    #[test]
    fn non_positive_quantity_is_rejected_per_item() {
        let mut req = request();
        req.services.push(ServiceSelection {
            service_id: Uuid::from_u128(3).to_string(),
            quantity: 0,
        });
        req.services.push(ServiceSelection {
            service_id: Uuid::from_u128(4).to_string(),
            quantity: -2,
        });

        let errors = req.validate().unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["services[1].quantity", "services[2].quantity"]
        );
    }

    #[test]
    fn missing_references_are_all_reported() {
        let mut req = request();
        req.address_id.clear();
        req.service_date.clear();
        req.payment_method_id = " ".to_string();
        req.home_details = None;

        let errors = req.validate().unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["addressId", "serviceDate", "homeDetails", "paymentMethodId"]
        );
    }

    #[test]
    fn undersized_home_is_rejected() {
        let mut req = request();
        req.home_details = Some(HomeDetails {
            square_footage: 40,
            ..home()
        });

        let errors = req.validate().unwrap_err();
        assert_eq!(fields(&errors), vec!["homeDetails.squareFootage"]);
    }

    #[test]
    fn status_machine_allows_forward_edges_and_cancellation() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(PaymentPending));
        assert!(PaymentPending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
    }
}
