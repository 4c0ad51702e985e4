use std::collections::HashMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use crate::error::Error;
use super::errors::AppError;
use super::payload::{body_token, extract_payment, is_authorized, read_payload};

pub const TOKEN_HEADER: &str = "x-webhook-token";

pub async fn health() -> &'static str {
    "ok"
}

/// Payment notification without a token in the path.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    record_payment(&state, None, &query, &headers, &body)
}

/// Payment notification carrying the token as the last path segment.
pub async fn payment_webhook_with_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    record_payment(&state, Some(&token), &query, &headers, &body)
}

fn record_payment(
    state: &AppState,
    path_token: Option<&str>,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<Value>, AppError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let payload = read_payload(content_type, body);
    let logged = Value::Object(payload.clone());
    info!(payload = %logged, "received payment webhook");

    let header_token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let body_token = body_token(&payload);
    let authorized = is_authorized(
        state.webhook_token.as_deref(),
        &[
            header_token,
            query.get("token").map(String::as_str),
            body_token.as_deref(),
            path_token,
        ],
    );
    if !authorized {
        return Err(AppError::Unauthorized);
    }

    let payment = extract_payment(&payload)
        .ok_or_else(|| AppError::Validation("missing order_id or email/phone".to_string()))?;

    let db = state
        .db
        .lock()
        .map_err(|_| AppError::from(Error::LockPoisoned))?;
    let stored = db.transaction(|db| db.upsert_payment(&payment))?;
    info!(
        order_id = %stored.order_id,
        status = %stored.status,
        "payment stored"
    );

    Ok(Json(json!({"ok": true})))
}
