use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::UserId;
use crate::error::{AppError, FieldError};
use crate::geo::GeoPoint;
use crate::models::address::Address;
use crate::models::notification::Notification;
use crate::models::service::{Service, ServiceCategory};
use crate::services::{AddressBook, ServiceCatalog};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/services", post(create_service))
        .route("/services/:id", get(get_service))
        .route("/addresses", post(create_address))
        .route("/addresses/:id", get(get_address))
        .route("/notifications", get(list_notifications))
}

#[derive(Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub category: ServiceCategory,
    pub base_price: Decimal,
    #[serde(default)]
    pub price_per_sqft: Decimal,
    pub duration_minutes: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct CreateAddressRequest {
    #[serde(default)]
    pub label: String,
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub location: GeoPoint,
}

fn is_zip_code(value: &str) -> bool {
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());

    match value.split_once('-') {
        None => value.len() == 5 && all_digits(value),
        Some((head, tail)) => head.len() == 5 && all_digits(head) && tail.len() == 4 && all_digits(tail),
    }
}

async fn create_service(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let mut errors = Vec::new();

    if payload.name.trim().is_empty() {
        errors.push(FieldError::new("name", "service name cannot be empty"));
    }
    if payload.base_price.is_sign_negative() {
        errors.push(FieldError::new("base_price", "base price cannot be negative"));
    }
    if payload.price_per_sqft.is_sign_negative() {
        errors.push(FieldError::new("price_per_sqft", "price per sqft cannot be negative"));
    }
    if payload.duration_minutes == 0 {
        errors.push(FieldError::new("duration_minutes", "duration must be > 0"));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let service = Service {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        category: payload.category,
        base_price: payload.base_price,
        price_per_sqft: payload.price_per_sqft,
        duration_minutes: payload.duration_minutes,
        is_active: payload.is_active,
    };

    state.store.insert_service(service.clone());
    Ok((StatusCode::CREATED, Json(service)))
}

async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Service>, AppError> {
    state
        .store
        .get_service(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("service {} not found", id)))
}

async fn create_address(
    State(state): State<Arc<AppState>>,
    UserId(customer_id): UserId,
    Json(payload): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    let mut errors = Vec::new();

    for (field, value) in [
        ("street_address", &payload.street_address),
        ("city", &payload.city),
        ("state", &payload.state),
    ] {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, format!("{field} cannot be empty")));
        }
    }
    if !is_zip_code(payload.zip_code.trim()) {
        errors.push(FieldError::new("zip_code", "zip code must be 12345 or 12345-6789"));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let address = Address {
        id: Uuid::new_v4(),
        customer_id,
        label: payload.label.trim().to_string(),
        street_address: payload.street_address.trim().to_string(),
        city: payload.city.trim().to_string(),
        state: payload.state.trim().to_string(),
        zip_code: payload.zip_code.trim().to_string(),
        location: payload.location,
    };

    state.store.insert_address(address.clone());
    Ok((StatusCode::CREATED, Json(address)))
}

async fn get_address(
    State(state): State<Arc<AppState>>,
    UserId(requester): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Address>, AppError> {
    match state.store.get_address(id).await? {
        Some(address) if address.customer_id == requester => Ok(Json(address)),
        _ => Err(AppError::NotFound(format!("address {} not found", id))),
    }
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Json<Vec<Notification>> {
    Json(state.store.notifications_for(user_id))
}

#[cfg(test)]
mod tests {
    use super::is_zip_code;

    #[test]
    fn accepts_five_digit_and_plus_four_zip_codes() {
        assert!(is_zip_code("78701"));
        assert!(is_zip_code("78701-1234"));
    }

    #[test]
    fn rejects_malformed_zip_codes() {
        assert!(!is_zip_code("7870"));
        assert!(!is_zip_code("78701-12"));
        assert!(!is_zip_code("7870a"));
        assert!(!is_zip_code(""));
    }
}
