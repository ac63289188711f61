use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cleanconnect_dispatch::api::rest::{USER_ID_HEADER, router};
use cleanconnect_dispatch::engine::lifecycle::LifecycleSettings;
use cleanconnect_dispatch::state::AppState;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

const CUSTOMER: &str = "00000000-0000-0000-0000-00000000000a";

fn setup() -> axum::Router {
    let state = AppState::new(LifecycleSettings::default(), 1024);
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_empty(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(raw) => Decimal::from_str(raw).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

fn monday_hours() -> Value {
    json!({ "monday": [{ "start": "08:00", "end": "17:00" }] })
}

struct Seeded {
    service_id: String,
    address_id: String,
    provider_id: String,
}

async fn seed(app: &axum::Router) -> Seeded {
    let (status, service) = send(
        app,
        json_request(
            "POST",
            "/services",
            None,
            json!({
                "name": "Standard Clean",
                "category": "standard",
                "base_price": "60.00",
                "price_per_sqft": "0.08",
                "duration_minutes": 120
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, address) = send(
        app,
        json_request(
            "POST",
            "/addresses",
            Some(CUSTOMER),
            json!({
                "label": "Home",
                "street_address": "75 Rev Dr Martin Luther King Jr Blvd",
                "city": "St Paul",
                "state": "MN",
                "zip_code": "55155",
                "location": { "lat": 44.9537, "lng": -93.0900 }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, provider) = send(
        app,
        json_request(
            "POST",
            "/providers",
            None,
            json!({
                "business_name": "Sparkle Squad",
                "service_location": { "lat": 44.9778, "lng": -93.2650 },
                "service_radius_miles": 25.0,
                "availability": monday_hours()
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let provider_id = provider["provider_id"].as_str().unwrap().to_string();

    let (status, verified) = send(
        app,
        json_request(
            "PATCH",
            &format!("/providers/{provider_id}/status"),
            None,
            json!({ "verification_status": "verified" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["verification_status"], "verified");

    Seeded {
        service_id: service["id"].as_str().unwrap().to_string(),
        address_id: address["id"].as_str().unwrap().to_string(),
        provider_id,
    }
}

fn booking_body(seeded: &Seeded) -> Value {
    json!({
        "addressId": seeded.address_id,
        "serviceDate": "2030-06-03T10:00:00-05:00",
        "services": [{ "serviceId": seeded.service_id, "quantity": 1 }],
        "homeDetails": {
            "bedrooms": 3,
            "bathrooms": 2,
            "squareFootage": 1000,
            "floors": 2,
            "pets": false
        },
        "paymentMethodId": "pm_card_visa"
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let (status, body) = send(&app, get_request("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], 0);
    assert_eq!(body["bookings"], 0);
    assert_eq!(body["notifications"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("matched_providers"));
}

#[tokio::test]
async fn booking_is_priced_and_advertised_to_matching_provider() {
    let app = setup();
    let seeded = seed(&app).await;

    let (status, body) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), booking_body(&seeded)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["subtotal"]), Decimal::new(14_000, 2));
    assert_eq!(decimal(&body["commission"]), Decimal::new(2_520, 2));
    assert_eq!(decimal(&body["processing_fee"]), Decimal::new(436, 2));
    assert_eq!(decimal(&body["total_amount"]), Decimal::new(16_956, 2));
    assert_eq!(body["status"], "payment_pending");
    assert_eq!(body["duration_minutes"], 120);
    assert_eq!(body["booking_items"].as_array().unwrap().len(), 1);
    assert_eq!(body["booking_items"][0]["name"], "Standard Clean");
    assert_eq!(body["warnings"], json!([]));
    assert_eq!(body["side_steps"]["payment_intent"]["status"], "completed");
    assert_eq!(body["side_steps"]["fanout"]["total"], 1);
    assert_eq!(body["side_steps"]["fanout"]["successful"], 1);
    assert_eq!(body["side_steps"]["fanout"]["failed"], 0);

    let (status, inbox) = send(
        &app,
        get_request("/notifications", Some(&seeded.provider_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["type"], "booking_opportunity");
}

#[tokio::test]
async fn invalid_booking_reports_every_field() {
    let app = setup();
    let (status, body) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), json!({ "services": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);

    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|detail| detail["field"].as_str().unwrap())
        .collect();
    for expected in ["addressId", "serviceDate", "services", "homeDetails", "paymentMethodId"] {
        assert!(fields.contains(&expected), "missing {expected} in {fields:?}");
    }
}

#[tokio::test]
async fn unknown_service_is_rejected_before_anything_is_stored() {
    let app = setup();
    let mut seeded = seed(&app).await;
    seeded.service_id = Uuid::new_v4().to_string();

    let (status, body) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), booking_body(&seeded)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("service not found"));

    let (_, health) = send(&app, get_request("/health", None)).await;
    assert_eq!(health["bookings"], 0);
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let app = setup();
    let (status, body) = send(&app, json_request("POST", "/bookings", None, json!({}))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn booking_moves_through_its_lifecycle() {
    let app = setup();
    let seeded = seed(&app).await;
    let provider = seeded.provider_id.clone();

    let (_, created) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), booking_body(&seeded)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, early_start) = send(
        &app,
        post_empty(&format!("/bookings/{id}/start"), Some(&provider)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(early_start["error"].as_str().unwrap().contains("no provider"));

    let (status, confirmed) = send(
        &app,
        post_empty(&format!("/bookings/{id}/confirm-payment"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, assigned) = send(
        &app,
        json_request(
            "POST",
            &format!("/bookings/{id}/assign"),
            None,
            json!({ "provider_id": provider }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["provider_id"], provider.as_str());
    assert!(assigned["assigned_at"].is_string());

    let (status, started) = send(
        &app,
        post_empty(&format!("/bookings/{id}/start"), Some(&provider)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["status"], "in_progress");

    let (status, completed) = send(
        &app,
        post_empty(&format!("/bookings/{id}/complete"), Some(&provider)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");

    let (status, late_cancel) = send(
        &app,
        json_request(
            "POST",
            &format!("/bookings/{id}/cancel"),
            Some(CUSTOMER),
            json!({ "reason": "changed my mind" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(late_cancel["error"].as_str().unwrap().contains("completed"));

    let (status, inbox) = send(&app, get_request("/notifications", Some(CUSTOMER))).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = inbox
        .as_array()
        .unwrap()
        .iter()
        .map(|notification| notification["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"provider_assigned"));
    assert_eq!(kinds.iter().filter(|kind| **kind == "booking_update").count(), 3);
}

#[tokio::test]
async fn customer_can_cancel_with_reason_and_list_bookings() {
    let app = setup();
    let seeded = seed(&app).await;

    let (_, created) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), booking_body(&seeded)),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(
        &app,
        json_request(
            "POST",
            &format!("/bookings/{id}/cancel"),
            Some(CUSTOMER),
            json!({ "reason": "moving house" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "moving house");

    let (status, listed) = send(
        &app,
        get_request("/bookings?status=cancelled", Some(CUSTOMER)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], id.as_str());

    let (status, _) = send(&app, get_request("/bookings?limit=51", Some(CUSTOMER))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stranger = Uuid::new_v4().to_string();
    let (status, _) = send(&app, get_request(&format!("/bookings/{id}"), Some(&stranger))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overlapping_availability_is_rejected() {
    let app = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/providers",
            None,
            json!({
                "business_name": "Double Booked",
                "availability": {
                    "tuesday": [
                        { "start": "09:00", "end": "12:00" },
                        { "start": "11:00", "end": "14:00" }
                    ]
                }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "availability");
}

#[tokio::test]
async fn provider_radius_outside_bounds_is_rejected() {
    let app = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/providers",
            None,
            json!({ "business_name": "Far Reach", "service_radius_miles": 80.0 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "service_radius_miles");
}

#[tokio::test]
async fn match_endpoint_respects_availability_and_radius() {
    let app = setup();
    let seeded = seed(&app).await;

    let (status, matched) = send(
        &app,
        get_request(
            "/providers/match?lat=44.9537&lng=-93.09&start=2030-06-03T10:00:00-05:00",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(matched.as_array().unwrap().len(), 1);
    assert_eq!(matched[0]["provider_id"], seeded.provider_id.as_str());

    let (status, too_late) = send(
        &app,
        get_request(
            "/providers/match?lat=44.9537&lng=-93.09&start=2030-06-03T16:00:00-05:00&duration=120",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(too_late.as_array().unwrap().is_empty());

    let (status, too_far) = send(
        &app,
        get_request(
            "/providers/match?lat=41.8781&lng=-87.6298&start=2030-06-03T10:00:00-05:00",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(too_far.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn address_with_bad_zip_is_rejected() {
    let app = setup();
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/addresses",
            Some(CUSTOMER),
            json!({
                "street_address": "1 Main St",
                "city": "Austin",
                "state": "TX",
                "zip_code": "787",
                "location": { "lat": 30.2672, "lng": -97.7431 }
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "zip_code");
}

#[tokio::test]
async fn booking_opportunity_is_published_on_the_live_feed() {
    let state = Arc::new(AppState::new(LifecycleSettings::default(), 1024));
    let mut feed = state.store.subscribe_notifications();
    let app = router(state);
    let seeded = seed(&app).await;

    let (status, _) = send(
        &app,
        json_request("POST", "/bookings", Some(CUSTOMER), booking_body(&seeded)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), feed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.user_id.to_string(), seeded.provider_id);
    assert_eq!(
        serde_json::to_value(&event).unwrap()["type"],
        "booking_opportunity"
    );
}

#[tokio::test]
async fn match_without_duration_uses_configured_booking_length() {
    let settings = LifecycleSettings {
        default_duration_minutes: 600,
        ..LifecycleSettings::default()
    };
    let app = router(Arc::new(AppState::new(settings, 1024)));
    seed(&app).await;

    // 08:00 plus ten hours runs past the 17:00 close.
    let (status, defaulted) = send(
        &app,
        get_request(
            "/providers/match?lat=44.9537&lng=-93.09&start=2030-06-03T08:00:00-05:00",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(defaulted.as_array().unwrap().is_empty());

    let (status, explicit) = send(
        &app,
        get_request(
            "/providers/match?lat=44.9537&lng=-93.09&start=2030-06-03T08:00:00-05:00&duration=120",
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(explicit.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn out_of_range_hours_in_availability_are_rejected() {
    let app = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/providers",
            None,
            json!({
                "business_name": "Night Owls",
                "availability": { "monday": [{ "start": "1093:00", "end": "1100:00" }] }
            }),
        ))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
