use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router, middleware};
use liwa_bookings::{BookingError, BookingService, PaymentOutcome, PaymentStart};
use liwa_config::Settings;
use liwa_models::{Booking, BookingForm};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::auth::require_admin;

/// Bookings shown on the admin overview.
const RECENT_BOOKINGS: usize = 25;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub admin_pin: Arc<str>,
    pub settings_path: PathBuf,
}

type ApiResult<T> = Result<T, (StatusCode, String)>;

fn error_response(e: BookingError) -> (StatusCode, String) {
    let status = match &e {
        BookingError::Validation(_) => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::NotPaid(_) => StatusCode::FORBIDDEN,
        BookingError::Persistence(inner) => {
            error!("Booking store failure: {inner:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!("{e:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn outcome_label(outcome: &PaymentOutcome) -> &'static str {
    match outcome {
        PaymentOutcome::Redirect(_) => "redirect",
        PaymentOutcome::MissingRedirect => "missing_redirect",
        PaymentOutcome::NotConfigured => "not_configured",
        PaymentOutcome::GatewayFailed => "gateway_failed",
    }
}

fn payment_json(start: &PaymentStart) -> Value {
    let redirect_url = match &start.outcome {
        PaymentOutcome::Redirect(url) => Some(url.as_str()),
        _ => None,
    };
    json!({
        "booking": start.booking,
        "payment": outcome_label(&start.outcome),
        "redirect_url": redirect_url,
    })
}

// --- Public ---

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version_string()
    }))
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim_start().starts_with("application/json"))
}

/// Booking form from a url-encoded or JSON body.
async fn read_booking_form(request: Request, state: &AppState) -> ApiResult<BookingForm> {
    if is_json(&request) {
        let Json(form) = Json::<BookingForm>::from_request(request, state)
            .await
            .map_err(|r| (r.status(), r.body_text()))?;
        Ok(form)
    } else {
        let Form(form) = Form::<BookingForm>::from_request(request, state)
            .await
            .map_err(|r| (r.status(), r.body_text()))?;
        Ok(form)
    }
}

/// Booking post (form or JSON): sends the visitor straight to the payment page.
async fn book(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let form = read_booking_form(request, &state).await?;
    let start = state.service.book(&form).await.map_err(error_response)?;
    match &start.outcome {
        PaymentOutcome::Redirect(url) => Ok(Redirect::to(url).into_response()),
        PaymentOutcome::NotConfigured => Ok(Json(json!({
            "booking": start.booking,
            "payment": "not_configured",
            "message": "Online payment is not configured. Contact the organiser to complete payment."
        }))
        .into_response()),
        PaymentOutcome::GatewayFailed => Err((
            StatusCode::BAD_GATEWAY,
            "Failed to create payment intent.".to_string(),
        )),
        PaymentOutcome::MissingRedirect => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Payment intent created but no redirect URL.".to_string(),
        )),
    }
}

/// JSON booking: always answers with the booking and the payment outcome.
async fn api_create_booking(
    State(state): State<AppState>,
    Json(form): Json<BookingForm>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let start = state.service.book(&form).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(payment_json(&start))))
}

async fn api_get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Booking>> {
    state.service.get(&booking_id).await.map(Json).map_err(error_response)
}

#[derive(Deserialize)]
struct PaymentResultQuery {
    #[serde(default)]
    result: String,
    #[serde(default)]
    pi_id: String,
}

async fn payment_result(
    State(state): State<AppState>,
    Query(params): Query<PaymentResultQuery>,
) -> ApiResult<Json<Value>> {
    let outcome = state
        .service
        .handle_callback(&params.result, &params.pi_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "booking_id": outcome.booking.as_ref().map(|b| b.booking_id.clone()),
        "booking": outcome.booking,
        "pi_id": outcome.intent_id,
        "status": outcome.status,
    })))
}

async fn ticket(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Booking>> {
    state.service.ticket(&booking_id).await.map(Json).map_err(error_response)
}

// --- Admin ---

async fn admin_bookings(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let summary = state.service.summary().await.map_err(error_response)?;
    let mut bookings = state.service.list().await.map_err(error_response)?;
    bookings.truncate(RECENT_BOOKINGS);
    Ok(Json(json!({ "summary": summary, "bookings": bookings })))
}

async fn admin_sync(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    if !state.service.gateway().is_configured() {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "Ziina is not configured.".to_string()));
    }
    let report = state.service.sync_all().await.map_err(error_response)?;
    Ok(Json(json!({
        "checked": report.checked,
        "refreshed": report.refreshed,
        "updated": report.updated,
    })))
}

async fn admin_get_settings(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let settings = Settings::load(&state.settings_path).map_err(internal)?;
    Ok(Json(Value::Object(settings.values().clone())))
}

async fn admin_save_settings(
    State(state): State<AppState>,
    Form(submitted): Form<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let mut settings = Settings::load(&state.settings_path).map_err(internal)?;
    settings.merge(submitted);
    settings.save().map_err(internal)?;
    Ok(Json(Value::Object(settings.values().clone())))
}

pub fn router(state: AppState, assets_dir: PathBuf) -> Router {
    let admin_routes = Router::new()
        .route("/bookings", get(admin_bookings))
        .route("/sync", post(admin_sync))
        .route("/settings", get(admin_get_settings).post(admin_save_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api_routes = Router::new()
        .route("/bookings", post(api_create_booking))
        .route("/bookings/{id}", get(api_get_booking));

    Router::new()
        .route("/health", get(health))
        .route("/book", post(book))
        .route("/payment_result", get(payment_result))
        .route("/ticket/{id}", get(ticket))
        .nest("/api", api_routes)
        .nest("/admin", admin_routes)
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
