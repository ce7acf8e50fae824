use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use constant_time_eq::constant_time_eq;
use tracing::warn;

use crate::routes::AppState;

/// Password part of an HTTP Basic `Authorization` header value.
fn basic_password(value: &str) -> Option<String> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_user, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

/// Admin routes use HTTP Basic with the admin PIN as password; the user
/// name is ignored.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(basic_password);

    match supplied {
        Some(pin) if constant_time_eq(pin.as_bytes(), state.admin_pin.as_bytes()) => {
            next.run(request).await
        }
        _ => {
            warn!("Rejected admin request to {}", request.uri().path());
            (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"liwa-admin\"")],
                "Incorrect PIN",
            )
                .into_response()
        }
    }
}
