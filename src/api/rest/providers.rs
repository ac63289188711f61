use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post, put};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::availability::normalize_availability;
use crate::engine::matching::JobRequest;
use crate::error::{AppError, FieldError};
use crate::geo::GeoPoint;
use crate::models::provider::{
    NotificationPreferences, ProviderCandidate, VerificationStatus, WeeklyAvailability,
};
use crate::services::ProviderDirectory;
use crate::state::AppState;

const MIN_SERVICE_RADIUS_MILES: f64 = 5.0;
const MAX_SERVICE_RADIUS_MILES: f64 = 50.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(create_provider))
        .route("/providers/match", get(match_providers))
        .route("/providers/:id", get(get_provider))
        .route("/providers/:id/availability", put(update_availability))
        .route("/providers/:id/status", patch(update_status))
}

#[derive(Deserialize)]
pub struct CreateProviderRequest {
    pub provider_id: Option<Uuid>,
    pub business_name: String,
    pub service_location: Option<GeoPoint>,
    pub service_radius_miles: Option<f64>,
    #[serde(default)]
    pub availability: WeeklyAvailability,
    pub phone: Option<String>,
    #[serde(default)]
    pub preferences: NotificationPreferences,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub verification_status: Option<VerificationStatus>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct MatchParams {
    pub lat: f64,
    pub lng: f64,
    pub start: String,
    pub duration: Option<u32>,
}

fn validated_availability(availability: WeeklyAvailability) -> Result<WeeklyAvailability, AppError> {
    normalize_availability(availability)
        .map_err(|err| AppError::Validation(vec![FieldError::new("availability", err.to_string())]))
}

async fn load_provider(state: &AppState, id: Uuid) -> Result<ProviderCandidate, AppError> {
    state
        .store
        .get_provider(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("provider {} not found", id)))
}

async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProviderRequest>,
) -> Result<Json<ProviderCandidate>, AppError> {
    let mut errors = Vec::new();

    if payload.business_name.trim().is_empty() {
        errors.push(FieldError::new("business_name", "business name cannot be empty"));
    }

    if let Some(radius) = payload.service_radius_miles {
        if !(MIN_SERVICE_RADIUS_MILES..=MAX_SERVICE_RADIUS_MILES).contains(&radius) {
            errors.push(FieldError::new(
                "service_radius_miles",
                format!(
                    "service radius must be between {MIN_SERVICE_RADIUS_MILES} and {MAX_SERVICE_RADIUS_MILES} miles"
                ),
            ));
        }
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let provider = ProviderCandidate {
        provider_id: payload.provider_id.unwrap_or_else(Uuid::new_v4),
        business_name: payload.business_name.trim().to_string(),
        verification_status: VerificationStatus::Pending,
        is_active: true,
        service_location: payload.service_location,
        service_radius_miles: payload.service_radius_miles,
        availability: validated_availability(payload.availability)?,
        phone: payload.phone,
        preferences: payload.preferences,
        updated_at: Utc::now(),
    };

    state.store.upsert_provider(provider.clone()).await?;
    Ok(Json(provider))
}

async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProviderCandidate>, AppError> {
    Ok(Json(load_provider(&state, id).await?))
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WeeklyAvailability>,
) -> Result<Json<ProviderCandidate>, AppError> {
    let mut provider = load_provider(&state, id).await?;

    provider.availability = validated_availability(payload)?;
    provider.updated_at = Utc::now();

    state.store.upsert_provider(provider.clone()).await?;
    Ok(Json(provider))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<ProviderCandidate>, AppError> {
    let mut provider = load_provider(&state, id).await?;

    if let Some(status) = payload.verification_status {
        provider.verification_status = status;
    }
    if let Some(is_active) = payload.is_active {
        provider.is_active = is_active;
    }
    provider.updated_at = Utc::now();

    state.store.upsert_provider(provider.clone()).await?;
    Ok(Json(provider))
}

async fn match_providers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchParams>,
) -> Result<Json<Vec<ProviderCandidate>>, AppError> {
    let start_time = DateTime::parse_from_rfc3339(params.start.trim())
        .map_err(|err| AppError::BadRequest(format!("start must be an RFC 3339 timestamp: {err}")))?;

    let duration_minutes = params
        .duration
        .unwrap_or(state.orchestrator.settings().default_duration_minutes);
    if duration_minutes == 0 {
        return Err(AppError::BadRequest("duration must be > 0".to_string()));
    }

    let job = JobRequest {
        location: GeoPoint::new(params.lat, params.lng),
        start_time,
        duration_minutes,
    };

    let candidates = state.orchestrator.match_providers(&job).await?;
    Ok(Json(candidates))
}
