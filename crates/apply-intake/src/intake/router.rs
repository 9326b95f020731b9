use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::domain::{ApplicationId, Submission};
use super::repository::ApplicationRepository;
use super::service::{IntakeError, IntakeService};

pub const SUBMIT_PATH: &str = "/api/apply";

/// Largest accepted request body, in bytes.
pub const BODY_LIMIT: usize = 100 * 1024;

pub const SERVER_ERROR_MESSAGE: &str = "Server error. Please try again later.";
pub const INVALID_BODY_MESSAGE: &str = "Invalid JSON body.";

const FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub id: ApplicationId,
}

/// Router builder exposing the intake endpoint.
pub fn intake_router<R>(service: Arc<IntakeService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route(SUBMIT_PATH, post(submit_handler::<R>))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(service)
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<IntakeService<R>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let submission = match parse_submission(&headers, &body) {
        Ok(submission) => submission,
        Err(err) => {
            debug!(error = %err, "rejected unparseable submission body");
            return error_response(StatusCode::BAD_REQUEST, INVALID_BODY_MESSAGE);
        }
    };

    let peer = connect_info.map(|ConnectInfo(addr)| addr.ip());
    let forwarded = forwarded_for(&headers);

    match service.submit(submission, peer, forwarded.as_deref()).await {
        Ok(id) => (StatusCode::OK, Json(SubmitResponse { ok: true, id })).into_response(),
        Err(IntakeError::Validation(errors)) => {
            error_response(StatusCode::BAD_REQUEST, &errors.to_string())
        }
        Err(IntakeError::Storage(_)) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
        }
    }
}

/// Reads the body the way a form client posts it: non-JSON content types and blank
/// bodies count as an empty submission, and a JSON array carries no fields.
fn parse_submission(headers: &HeaderMap, body: &[u8]) -> Result<Submission, serde_json::Error> {
    if !is_json_content(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Submission::default());
    }

    match serde_json::from_slice::<Value>(body)? {
        value @ Value::Object(_) => serde_json::from_value(value),
        Value::Array(_) => Ok(Submission::default()),
        _ => Err(serde::de::Error::custom("expected a JSON object or array")),
    }
}

fn is_json_content(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// Joins repeated forwarding headers with `", "`, matching how proxies chain them.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join(", "))
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
