//! iRacing member relay
//!
//! Single-binary Rust service that:
//! 1. Logs in to the iRacing members API (password hash or browser PKCE flow)
//! 2. Keeps the credential verified, re-authenticating through a bounded gate
//! 3. Answers driver-name searches for the speedtrapbets.com frontend
//! 4. Exposes health and Prometheus metrics endpoints

mod config;
mod metrics;
mod oauth;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use iracing_auth::Endpoints;
use iracing_data::DriverLookupResult;
use iracing_session::{AccessDecision, AuthSession, PasswordLogin, ReauthPolicy};

use crate::config::Config;

/// How long in-flight requests get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) session: Arc<AuthSession>,
    pub(crate) client: reqwest::Client,
    pub(crate) prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
///
/// The browser-login routes are merged only when an `[oauth]` section is
/// configured; password-only deployments never expose them. CORS is pinned
/// to the single frontend origin with credentials allowed.
fn build_router(
    state: AppState,
    cors_origin: HeaderValue,
    max_connections: usize,
    oauth_enabled: bool,
) -> Router {
    let mut router = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/search-iracing-name", get(search_handler))
        .route("/metrics", get(metrics_handler));
    if oauth_enabled {
        router = router.merge(oauth::router());
    }
    router
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                .allow_credentials(true),
        )
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting iracing-member-relay");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        base_url = %config.iracing.base_url,
        frontend_origin = %config.server.frontend_origin,
        password_login = config.iracing.email.is_some(),
        oauth_login = config.oauth.is_some(),
        "configuration loaded"
    );

    let cors_origin: HeaderValue = config.server.frontend_origin.parse().map_err(|_| {
        anyhow::anyhow!(
            "frontend_origin is not a valid header value: {}",
            config.server.frontend_origin
        )
    })?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.iracing.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let endpoints = Endpoints {
        members_base: config.iracing.base_url.clone(),
        profile_url: config
            .oauth
            .as_ref()
            .map(|o| o.profile_url.clone())
            .unwrap_or_else(|| iracing_auth::PROFILE_ENDPOINT.to_string()),
    };

    let password = match (&config.iracing.email, &config.iracing.password) {
        (Some(email), Some(password)) => Some(PasswordLogin {
            email: email.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    let oauth_settings = config.oauth.as_ref().map(|o| iracing_auth::OAuthSettings {
        client_id: o.client_id.clone(),
        redirect_uri: o.redirect_uri.clone(),
        authorize_url: o.authorize_url.clone(),
        token_url: o.token_url.clone(),
        scope: o.scope.clone(),
    });
    let oauth_enabled = oauth_settings.is_some();

    let session = Arc::new(AuthSession::new(
        client.clone(),
        endpoints,
        password,
        oauth_settings,
        ReauthPolicy {
            max_attempts: config.reauth.max_attempts,
            cooldown: Duration::from_secs(config.reauth.cooldown_secs),
        },
    ));

    // Initial login in password deployments. Failure leaves search degraded
    // until the gate recovers; the relay serves either way.
    if config.iracing.email.is_some() {
        match session.login_now().await {
            Ok(()) => info!("initial iRacing login succeeded"),
            Err(e) => warn!(error = %e, "initial iRacing login failed, continuing degraded"),
        }
    }

    let app_state = AppState {
        session,
        client,
        prometheus: prometheus_handle,
    };

    let app = build_router(
        app_state,
        cors_origin,
        config.server.max_connections,
        oauth_enabled,
    );

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.server.listen_addr))?;

    info!(addr = %config.server.listen_addr, "accepting requests");

    // Graceful shutdown: stop accepting on SIGTERM/SIGINT, then give
    // in-flight requests DRAIN_TIMEOUT to finish.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Record the request metric and render a JSON error/result body.
pub(crate) fn json_response(
    route: &'static str,
    started: Instant,
    status: StatusCode,
    body: serde_json::Value,
) -> Response {
    metrics::record_request(route, status.as_u16(), started.elapsed().as_secs_f64());
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// GET /api/health: liveness only, never gated on upstream state.
async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "status": "OK" }).to_string(),
    )
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[derive(Deserialize)]
struct SearchParams {
    name: Option<String>,
}

/// GET /api/search-iracing-name: the gated driver search.
///
/// Parameter validation runs before the gate so malformed requests never
/// spend probes or re-login attempts.
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    search_driver(&state, params, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, method = "GET", path = "/api/search-iracing-name"))]
async fn search_driver(state: &AppState, params: SearchParams, request_id: String) -> Response {
    let started = Instant::now();

    let name = match params.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return json_response(
                "/api/search-iracing-name",
                started,
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "Name parameter is required" }),
            );
        }
    };

    match state.session.authorize().await {
        AccessDecision::Granted => {}
        AccessDecision::Denied(reason) => {
            warn!(
                reason = reason.label(),
                "search rejected by re-authentication gate"
            );
            return json_response(
                "/api/search-iracing-name",
                started,
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "iRacing authentication failed" }),
            );
        }
    }

    // Deferred confirmation: a just-failed re-login can leave the slot
    // empty even though the request was granted.
    let Some(credential) = state.session.current_credential().await else {
        metrics::record_lookup_error("no_credential");
        return json_response(
            "/api/search-iracing-name",
            started,
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "error": "Failed to search for driver",
                "details": "no iRacing credential held",
            }),
        );
    };

    let members_base = &state.session.endpoints().members_base;
    match iracing_data::find_driver_by_name(&state.client, members_base, &name, &credential).await
    {
        Ok(DriverLookupResult::Found {
            display_name,
            customer_id,
        }) => {
            info!(name = %name, customer_id, "driver found");
            json_response(
                "/api/search-iracing-name",
                started,
                StatusCode::OK,
                serde_json::json!({
                    "exists": true,
                    "name": display_name,
                    "id": customer_id,
                }),
            )
        }
        Ok(DriverLookupResult::NotFound) => {
            info!(name = %name, "driver not found");
            json_response(
                "/api/search-iracing-name",
                started,
                StatusCode::OK,
                serde_json::json!({
                    "exists": false,
                    "message": "Driver not found",
                }),
            )
        }
        Err(e) => {
            metrics::record_lookup_error(lookup_error_kind(&e));
            warn!(error = %e, "driver search failed");
            json_response(
                "/api/search-iracing-name",
                started,
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({
                    "error": "Failed to search for driver",
                    "details": e.to_string(),
                }),
            )
        }
    }
}

fn lookup_error_kind(e: &iracing_data::Error) -> &'static str {
    match e {
        iracing_data::Error::Transport(_) => "transport",
        iracing_data::Error::UpstreamStatus { .. } => "upstream_status",
        iracing_data::Error::InvalidResponse(_) => "invalid_response",
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Create a PrometheusHandle for tests without installing a global recorder.
/// Using build_recorder() avoids the "recorder already installed" panic when
/// multiple tests run in the same process.
#[cfg(test)]
pub(crate) fn test_prometheus_handle() -> PrometheusHandle {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    recorder.handle()
}
