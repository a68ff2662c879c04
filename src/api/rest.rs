// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Display endpoints are public — TV
// screens read them without credentials. Control endpoints (manual pick,
// autoplay toggle) require a valid Bearer token checked via the `AuthBearer`
// extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public display surface ──────────────────────────────────
        .route("/api/v1/health", get(health))
        .route("/api/v1/display", get(display))
        .route("/api/v1/board", get(board))
        .route("/api/v1/movers", get(movers))
        .route("/api/v1/chart", get(chart))
        // ── Authenticated controls ──────────────────────────────────
        .route("/api/v1/control/select", post(control_select))
        .route("/api/v1/control/autoplay", post(control_autoplay))
        // ── WebSocket push feed ─────────────────────────────────────
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: crate::types::now_ms(),
    };
    Json(resp)
}

// =============================================================================
// Display surfaces
// =============================================================================

async fn display(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

async fn board(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    Json(snapshot.board)
}

async fn movers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    Json(snapshot.movers)
}

async fn chart(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    match snapshot.selected {
        Some(selected) => Json(selected).into_response(),
        None => {
            let body = serde_json::json!({
                "selected": null,
                "message": "No products available yet",
            });
            Json(body).into_response()
        }
    }
}

// =============================================================================
// Control endpoints (authenticated)
// =============================================================================

#[derive(Deserialize)]
struct SelectRequest {
    product_id: i64,
}

#[derive(Serialize)]
struct SelectResponse {
    product_id: i64,
    index: usize,
    auto_rotate: bool,
}

/// Manual pick: selects the product and drops rotation to Manual.
async fn control_select(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let products = state.products.read().clone();
    let mut selection = state.selection.write();

    if !selection.select_product(&products, req.product_id) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Product {} not in the current snapshot", req.product_id),
            })),
        ));
    }

    let resp = SelectResponse {
        product_id: req.product_id,
        index: selection.index,
        auto_rotate: selection.auto_rotate,
    };
    drop(selection);
    state.increment_version();
    info!(product_id = req.product_id, "manual selection via API");

    Ok(Json(resp))
}

#[derive(Deserialize)]
struct AutoplayRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct AutoplayResponse {
    auto_rotate: bool,
}

async fn control_autoplay(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AutoplayRequest>,
) -> impl IntoResponse {
    {
        let mut selection = state.selection.write();
        selection.auto_rotate = req.enabled;
    }
    state.increment_version();
    info!(enabled = req.enabled, "autoplay toggled via API");

    Json(AutoplayResponse {
        auto_rotate: req.enabled,
    })
}
