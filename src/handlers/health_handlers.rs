//! Health & readiness handlers.
//!
//! - GET /         -> plain-text banner for uptime checks
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the metadata and object stores

use crate::{services::song_service::SongResult, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /`
pub async fn banner() -> &'static str {
    "Audio upload backend is running."
}

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against the metadata store (`SELECT 1`).
/// 2. Lists a single key from the object store.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (metadata, objects) =
        tokio::join!(state.songs.check_metadata(), state.songs.check_objects());

    let mut checks = HashMap::new();
    checks.insert("database", CheckStatus::from_check("database", metadata));
    checks.insert("object_store", CheckStatus::from_check("object_store", objects));

    let overall_ok = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<&'static str>,
}

impl CheckStatus {
    /// Failure detail goes to the log; clients only see that the check failed.
    fn from_check(check: &'static str, result: SongResult<()>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(err) => {
                tracing::warn!(check, error = %err, "readiness check failed");
                Self {
                    ok: false,
                    error: Some("unavailable"),
                }
            }
        }
    }
}
