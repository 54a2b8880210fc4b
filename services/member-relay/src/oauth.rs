//! Browser login routes
//!
//! Wired into the router only when the `[oauth]` config section is present:
//!
//! - GET /login: start the PKCE flow, 302 to the provider
//! - GET /callback: exchange the returned code, install the credential
//! - GET /profile: report whether the held credential still verifies

use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use iracing_session::Error as SessionError;

use crate::{AppState, json_response, metrics};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/profile", get(profile))
}

/// GET /login: redirect the browser to the provider's authorization URL.
async fn login(State(state): State<AppState>) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    start_login(&state, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, method = "GET", path = "/login"))]
async fn start_login(state: &AppState, request_id: String) -> Response {
    let started = Instant::now();
    match state.session.begin_login().await {
        Ok(url) => {
            metrics::record_request("/login", 302, started.elapsed().as_secs_f64());
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Err(e) => {
            warn!(error = %e, "failed to start browser login");
            json_response(
                "/login",
                started,
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": "Failed to start login",
                    "details": e.to_string(),
                }),
            )
        }
    }
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

/// GET /callback: finish the PKCE flow.
///
/// A missing code and a missing/expired pending login are the caller's
/// mistakes (400); a failed exchange is an upstream problem (500).
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    finish_login(&state, params, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, method = "GET", path = "/callback"))]
async fn finish_login(state: &AppState, params: CallbackParams, request_id: String) -> Response {
    let started = Instant::now();

    let Some(code) = params.code.as_deref() else {
        return json_response(
            "/callback",
            started,
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": "Missing authorization code" }),
        );
    };
    // The provider may append '#state' to the code
    let code = code.split('#').next().unwrap_or(code);

    match state.session.complete_login(code).await {
        Ok(access_token) => {
            info!("browser login completed");
            json_response(
                "/callback",
                started,
                StatusCode::OK,
                serde_json::json!({
                    "message": "Login successful",
                    "accessToken": access_token,
                }),
            )
        }
        Err(e @ (SessionError::NoPendingLogin | SessionError::LoginExpired)) => json_response(
            "/callback",
            started,
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": e.to_string() }),
        ),
        Err(e) => {
            warn!(error = %e, "code exchange failed");
            json_response(
                "/callback",
                started,
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": "Failed to complete login",
                    "details": e.to_string(),
                }),
            )
        }
    }
}

/// GET /profile: probe the held credential without touching the gate.
async fn profile(State(state): State<AppState>) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    probe_profile(&state, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, method = "GET", path = "/profile"))]
async fn probe_profile(state: &AppState, request_id: String) -> Response {
    let started = Instant::now();
    if state.session.verify_current().await {
        metrics::record_request("/profile", 200, started.elapsed().as_secs_f64());
        (StatusCode::OK, "Authenticated").into_response()
    } else {
        json_response(
            "/profile",
            started,
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "iRacing authentication failed" }),
        )
    }
}
