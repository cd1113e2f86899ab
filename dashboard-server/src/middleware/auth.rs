//! Auth layers (spec.md §6): a shared API key gates every `/api/*`
//! worker route; an operator gate (session cookie OR API key) covers the
//! operator surface. Worker session validation (`hostname` +
//! `session_token`) rides in the JSON body rather than a header, so it
//! is checked inline by the `register_worker`/`request_job`/`update_job`
//! handlers themselves instead of as middleware.
//!
//! Grounded on the bearer-token extraction shape in
//! `ferrex-server/src/auth/middleware.rs`, adapted to this system's
//! header-based API key instead of JWTs.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const OPERATOR_COOKIE: &str = "dashboard_session";

/// Gate for every `/api/*` worker route: the shared `API_KEY` must be
/// present and match exactly.
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, StatusCode> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.config.api_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Gate for operator routes: a valid `dashboard_session` cookie OR the
/// worker API key (spec.md §6 — "Session cookie OR API key").
pub async fn require_operator(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, StatusCode> {
    if let Some(key) = request.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        if key == state.config.api_key {
            return Ok(next.run(request).await);
        }
    }

    let token = extract_cookie(&request, OPERATOR_COOKIE).ok_or(StatusCode::UNAUTHORIZED)?;

    let valid = state
        .store
        .validate_operator_session(&token)
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    if valid {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn extract_cookie(request: &Request, name: &str) -> Option<String> {
    let header_value = request.headers().get(header::COOKIE)?.to_str().ok()?;
    header_value.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
