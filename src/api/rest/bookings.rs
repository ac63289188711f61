use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::UserId;
use crate::engine::lifecycle::BookingCreated;
use crate::error::AppError;
use crate::models::booking::{Booking, BookingQuery, BookingRequest, BookingStatus, BookingWithItems};
use crate::models::notification::FanoutReport;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id/confirm-payment", post(confirm_payment))
        .route("/bookings/:id/assign", post(assign_provider))
        .route("/bookings/:id/start", post(start_booking))
        .route("/bookings/:id/complete", post(complete_booking))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/bookings/:id/notify-providers", post(notify_providers))
}

#[derive(Deserialize)]
pub struct ListBookingsParams {
    pub status: Option<BookingStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct AssignProviderRequest {
    pub provider_id: Uuid,
}

#[derive(Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    UserId(customer_id): UserId,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingCreated>), AppError> {
    let Json(request) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;

    let created = state.orchestrator.create_booking(customer_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    UserId(customer_id): UserId,
    Query(params): Query<ListBookingsParams>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let defaults = BookingQuery::default();
    let query = BookingQuery {
        status: params.status,
        page: params.page.unwrap_or(defaults.page),
        limit: params.limit.unwrap_or(defaults.limit),
    };

    let bookings = state.orchestrator.list_bookings(customer_id, query).await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(state): State<Arc<AppState>>,
    UserId(requester): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingWithItems>, AppError> {
    let booking = state.orchestrator.get_booking(requester, id).await?;
    Ok(Json(booking))
}

async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.orchestrator.confirm_payment(id).await?;
    Ok(Json(booking))
}

async fn assign_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignProviderRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .orchestrator
        .assign_provider(id, payload.provider_id)
        .await?;
    Ok(Json(booking))
}

async fn start_booking(
    State(state): State<Arc<AppState>>,
    UserId(provider_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.orchestrator.start_booking(id, provider_id).await?;
    Ok(Json(booking))
}

async fn complete_booking(
    State(state): State<Arc<AppState>>,
    UserId(provider_id): UserId,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.orchestrator.complete_booking(id, provider_id).await?;
    Ok(Json(booking))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    UserId(requester): UserId,
    Path(id): Path<Uuid>,
    payload: Option<Json<CancelBookingRequest>>,
) -> Result<Json<Booking>, AppError> {
    let reason = payload.and_then(|Json(body)| body.reason);

    let booking = state
        .orchestrator
        .cancel_booking(requester, id, reason)
        .await?;
    Ok(Json(booking))
}

async fn notify_providers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<FanoutReport>, AppError> {
    let report = state.orchestrator.notify_available_providers(id).await?;
    Ok(Json(report))
}
