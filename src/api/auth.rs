// =============================================================================
// Admin Bearer Auth — control endpoint guard
// =============================================================================
//
// The display surface is read by unauthenticated TV screens; only the control
// endpoints are guarded. The expected token comes from the
// `BAARBOARD_ADMIN_TOKEN` environment variable, re-read per request so token
// rotation needs no restart, and is compared in constant time.
// =============================================================================

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::warn;

/// Extractor guarding the control endpoints: succeeds only when the request
/// carries `Authorization: Bearer <token>` matching `BAARBOARD_ADMIN_TOKEN`.
/// Any failure short-circuits the handler with a 403 JSON body.
pub struct AuthBearer;

type Rejection = (StatusCode, Json<Value>);

fn forbidden(message: &str) -> Rejection {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message })))
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthBearer {
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let expected = std::env::var("BAARBOARD_ADMIN_TOKEN").unwrap_or_default();
        if expected.is_empty() {
            warn!("BAARBOARD_ADMIN_TOKEN is not set — rejecting control request");
            return Err(forbidden("admin token not configured"));
        }

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
                Ok(AuthBearer)
            }
            Some(_) => {
                warn!("invalid admin token presented");
                Err(forbidden("invalid authorization token"))
            }
            None => {
                warn!("missing or malformed Authorization header");
                Err(forbidden("missing bearer token"))
            }
        }
    }
}

/// Byte-wise comparison that always scans the full slice, so the position of
/// a mismatch cannot be timed. Length is not secret here.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
