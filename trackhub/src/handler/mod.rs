//! Request handler: validation pipeline and the four operations.
//!
//! The handler is a plain function of `{method, path, headers, body}` to
//! `{status, headers, body}`. It knows nothing about sockets; the listener
//! runs it on a pool worker.
//!
//! ```text
//! path == "/" ──► method ∈ {GET, POST, DELETE} ──► headers ──► body ──► dispatch
//!     404                  405                  406/411/400   400
//!
//! GET                       list sessions
//! POST   (no Session-Id)    create session        SessionConfig body
//! POST   (Session-Id)       track detections      {"boxes": [...], "image": ...}
//! DELETE (Session-Id)       delete session
//! ```
//!
//! No shared state is touched until every precondition that does not need a
//! session has passed.

mod error;

pub use error::{ErrorBody, HandlerError};

use std::sync::Arc;

use axum::http::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use crate::pool::WorkerGauge;
use crate::registry::{RegistryError, SessionRegistry};
use crate::session::{SessionConfig, TrackResult, WireBatch};

/// Header carrying the session token, in both directions.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("session-id");

const JSON_MEDIA_TYPE: &str = "application/json";

/// Transport-independent view of an incoming request.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HandlerRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body together with matching Content-Type and Content-Length.
    pub fn with_json_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        self.body = body;
        self
    }
}

/// Transport-independent response.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HandlerResponse {
    /// Serializes `value` as a JSON response.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                let mut headers = HeaderMap::new();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
                Self {
                    status,
                    headers,
                    body: Bytes::from(body),
                }
            }
            Err(e) => Self::error(&HandlerError::Internal(e.to_string())),
        }
    }

    pub fn error(error: &HandlerError) -> Self {
        let body = error.body();
        let body = serde_json::to_vec(&body).unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
        if matches!(error, HandlerError::MethodNotAllowed { .. }) {
            headers.insert(ALLOW, HeaderValue::from_static("GET, POST, DELETE"));
        }
        Self {
            status: error.status_code(),
            headers,
            body: Bytes::from(body),
        }
    }

    /// Parses the body as JSON. Mostly useful in tests.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Body of the list and delete responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionList {
    pub sessions: Vec<String>,
    pub session_count: usize,
    pub max_sessions: usize,
    pub active_workers: usize,
    pub max_workers: usize,
    pub timestamp: f64,
}

#[derive(Serialize)]
struct CreatedSession<'a> {
    session_id: &'a str,
}

#[derive(Serialize)]
struct TrackResponse<'a> {
    #[serde(flatten)]
    result: &'a TrackResult,
    timestamp: f64,
}

fn timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Validates requests and dispatches them against the registry.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    registry: Arc<SessionRegistry>,
    workers: WorkerGauge,
}

impl RequestHandler {
    pub fn new(registry: Arc<SessionRegistry>, workers: WorkerGauge) -> Self {
        Self { registry, workers }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Handles one request. Never fails; errors become error responses.
    pub fn handle(&self, request: HandlerRequest) -> HandlerResponse {
        let method = request.method.clone();
        match self.dispatch(request) {
            Ok(response) => {
                debug!(method = %method, status = response.status.as_u16(), "Request handled");
                response
            }
            Err(e) => {
                warn!(
                    method = %method,
                    status = e.status_code().as_u16(),
                    error = %e,
                    "Request rejected"
                );
                HandlerResponse::error(&e)
            }
        }
    }

    fn dispatch(&self, request: HandlerRequest) -> Result<HandlerResponse, HandlerError> {
        if request.path != "/" {
            return Err(HandlerError::NotFound { path: request.path });
        }

        match request.method {
            Method::GET => Ok(self.list()),
            Method::POST => {
                check_json_content_type(&request.headers)?;
                check_content_length(&request.headers)?;
                match session_id(&request.headers)? {
                    None => self.create(&request.body),
                    Some(token) => self.track(token, &request.body),
                }
            }
            Method::DELETE => {
                let token = session_id(&request.headers)?.ok_or(HandlerError::MissingSessionId)?;
                self.delete(token)
            }
            other => Err(HandlerError::MethodNotAllowed {
                method: other.to_string(),
            }),
        }
    }

    fn session_list(&self) -> SessionList {
        let sessions = self.registry.list_tokens();
        SessionList {
            session_count: sessions.len(),
            sessions,
            max_sessions: self.registry.max_sessions(),
            active_workers: self.workers.active(),
            max_workers: self.workers.size(),
            timestamp: timestamp(),
        }
    }

    fn list(&self) -> HandlerResponse {
        HandlerResponse::json(StatusCode::OK, &self.session_list())
    }

    fn create(&self, body: &[u8]) -> Result<HandlerResponse, HandlerError> {
        let config: SessionConfig = serde_json::from_slice(body)
            .map_err(|e| HandlerError::MalformedRequest(e.to_string()))?;
        config.validate()?;

        let token = self.registry.create(config).map_err(|e| match e {
            RegistryError::CapacityExceeded { max } => HandlerError::CapacityExceeded { max },
            RegistryError::InvalidConfig(e) => HandlerError::InvalidConfig(e),
            RegistryError::NotFound => HandlerError::SessionNotFound,
        })?;

        let mut response = HandlerResponse::json(
            StatusCode::OK,
            &CreatedSession {
                session_id: token.as_str(),
            },
        );
        let value = HeaderValue::from_str(token.as_str())
            .map_err(|e| HandlerError::Internal(e.to_string()))?;
        response.headers.insert(SESSION_ID_HEADER, value);
        Ok(response)
    }

    fn track(&self, token: &str, body: &[u8]) -> Result<HandlerResponse, HandlerError> {
        let wire: WireBatch = serde_json::from_slice(body)
            .map_err(|e| HandlerError::MalformedRequest(e.to_string()))?;
        let session = self
            .registry
            .get(token)
            .map_err(|_| HandlerError::SessionNotFound)?;
        let batch = wire.into_batch(session.config().box_format)?;

        let result = session.track(&batch);
        Ok(HandlerResponse::json(
            StatusCode::OK,
            &TrackResponse {
                result: &result,
                timestamp: timestamp(),
            },
        ))
    }

    fn delete(&self, token: &str) -> Result<HandlerResponse, HandlerError> {
        if !self.registry.remove(token) {
            return Err(HandlerError::SessionNotFound);
        }
        Ok(self.list())
    }
}

/// Media type comparison ignores case and parameters such as `charset`.
fn check_json_content_type(headers: &HeaderMap) -> Result<(), HandlerError> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(JSON_MEDIA_TYPE));
    if is_json {
        Ok(())
    } else {
        Err(HandlerError::NotAcceptable)
    }
}

fn check_content_length(headers: &HeaderMap) -> Result<(), HandlerError> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or(HandlerError::LengthRequired)?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|_| ())
        .ok_or_else(|| HandlerError::MalformedRequest("invalid Content-Length".to_string()))
}

/// `None` when the header is absent; an error when it is present but unusable.
fn session_id(headers: &HeaderMap) -> Result<Option<&str>, HandlerError> {
    let Some(value) = headers.get(SESSION_ID_HEADER) else {
        return Ok(None);
    };
    let token = value
        .to_str()
        .map_err(|_| HandlerError::MalformedRequest("Session-Id is not valid text".to_string()))?
        .trim();
    if token.is_empty() {
        return Err(HandlerError::MissingSessionId);
    }
    Ok(Some(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use serde_json::{json, Value};

    fn handler(max_sessions: usize) -> RequestHandler {
        RequestHandler::new(
            Arc::new(SessionRegistry::new(max_sessions)),
            WorkerPool::new(4).gauge(),
        )
    }

    fn post(body: &str) -> HandlerRequest {
        HandlerRequest::new(Method::POST, "/").with_json_body(body.to_string())
    }

    fn with_session(request: HandlerRequest, token: &str) -> HandlerRequest {
        request.with_header(SESSION_ID_HEADER, HeaderValue::from_str(token).unwrap())
    }

    fn create(handler: &RequestHandler, body: &str) -> String {
        let response = handler.handle(post(body));
        assert_eq!(response.status, StatusCode::OK);
        let token = response.headers[&SESSION_ID_HEADER].to_str().unwrap().to_string();
        assert_eq!(response.json_body().unwrap()["session_id"], token.as_str());
        token
    }

    const DOOR_CONFIG: &str = r#"{
        "resolution": [640, 480],
        "regions": {"door": {"polygon": [[100, 100], [200, 100], [200, 200], [100, 200]],
                             "trigger_position": "CENTER"}}
    }"#;

    #[test]
    fn test_list_empty() {
        let response = handler(4).handle(HandlerRequest::new(Method::GET, "/"));
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json_body().unwrap();
        assert_eq!(body["sessions"], json!([]));
        assert_eq!(body["session_count"], 0);
        assert_eq!(body["max_sessions"], 4);
        assert_eq!(body["max_workers"], 4);
        assert_eq!(body["active_workers"], 0);
        assert!(body["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_unknown_path_is_404() {
        let response = handler(4).handle(HandlerRequest::new(Method::GET, "/sessions"));
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json_body().unwrap()["error"], "NOT_FOUND");
    }

    #[test]
    fn test_other_method_is_405() {
        let response = handler(4).handle(HandlerRequest::new(Method::PUT, "/"));
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers[ALLOW], "GET, POST, DELETE");
    }

    #[test]
    fn test_post_without_json_content_type_is_406() {
        let request = HandlerRequest::new(Method::POST, "/")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_header(CONTENT_LENGTH, HeaderValue::from_static("2"));
        assert_eq!(handler(4).handle(request).status, StatusCode::NOT_ACCEPTABLE);
    }

    #[test]
    fn test_content_type_parameters_are_ignored() {
        let handler = handler(4);
        let mut request = post(r#"{"resolution": [640, 480]}"#);
        request.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        assert_eq!(handler.handle(request).status, StatusCode::OK);
    }

    #[test]
    fn test_post_without_content_length_is_411() {
        let mut request = post("{}");
        request.headers.remove(CONTENT_LENGTH);
        assert_eq!(handler(4).handle(request).status, StatusCode::LENGTH_REQUIRED);
    }

    #[test]
    fn test_unparseable_content_length_is_400() {
        let mut request = post("{}");
        request
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(handler(4).handle(request).status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_create_and_list() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        assert_eq!(token.len(), 64);

        let body = handler
            .handle(HandlerRequest::new(Method::GET, "/"))
            .json_body()
            .unwrap();
        assert_eq!(body["sessions"], json!([token]));
        assert_eq!(body["session_count"], 1);
    }

    #[test]
    fn test_create_with_malformed_body_leaves_registry_unchanged() {
        let handler = handler(4);
        for body in ["not json", "[]", r#"{"resolution": "big"}"#, r#"{"resolution": [10, 10]}"#] {
            let response = handler.handle(post(body));
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {body}");
        }
        assert!(handler.registry().is_empty());
    }

    #[test]
    fn test_create_with_oversized_resolution_is_400() {
        let handler = handler(4);
        let response = handler.handle(post(r#"{"resolution": [4000000000, 4000000000]}"#));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json_body().unwrap()["error"], "INVALID_CONFIG");
        assert!(handler.registry().is_empty());
    }

    #[test]
    fn test_create_when_full_is_503() {
        let handler = handler(1);
        create(&handler, DOOR_CONFIG);
        let response = handler.handle(post(DOOR_CONFIG));
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.json_body().unwrap()["error"], "CAPACITY_EXCEEDED");
        assert_eq!(handler.registry().len(), 1);
    }

    #[test]
    fn test_track_door_scenario() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        let request = with_session(post(r#"{"boxes": [[150, 150, 20, 40, 90, 0]]}"#), &token);

        let response = handler.handle(request);
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json_body().unwrap();
        let boxes = body["tracked_boxes"].as_array().unwrap();
        assert_eq!(boxes.len(), 1);
        let row: Vec<i64> = boxes[0]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect();
        assert_eq!(&row[..6], &[150, 150, 20, 40, 90, 0]);
        assert_eq!(body["filtered_regions"]["door"], json!([row[6]]));
        assert!(body["annotated_image_mask"].is_string());
        assert!(body["timestamp"].is_number());
    }

    #[test]
    fn test_same_detection_twice_keeps_track_id() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        let ids: Vec<Value> = (0..2)
            .map(|_| {
                let request =
                    with_session(post(r#"{"boxes": [[150, 150, 20, 40, 90, 0]]}"#), &token);
                handler.handle(request).json_body().unwrap()["tracked_boxes"][0][6].clone()
            })
            .collect();
        assert!(ids[0].is_u64());
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn test_track_unknown_session_is_404() {
        let request = with_session(post(r#"{"boxes": []}"#), "nope");
        let response = handler(4).handle(request);
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.json_body().unwrap()["error"], "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_track_with_bad_rows_is_400() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        for body in [r#"{"boxes": [[1, 2, 3]]}"#, r#"{"boxes": "x"}"#, r#"{}"#] {
            let response = handler.handle(with_session(post(body), &token));
            assert_eq!(response.status, StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[test]
    fn test_track_with_non_json_bytes_leaves_state_unchanged() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        let tokens_before = handler.registry().list_tokens();

        let request = HandlerRequest::new(Method::POST, "/")
            .with_json_body(Bytes::from_static(b"\x00\xffnot json"));
        let response = handler.handle(with_session(request, &token));

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json_body().unwrap()["error"], "MALFORMED_REQUEST");
        assert_eq!(handler.registry().len(), 1);
        assert_eq!(handler.registry().list_tokens(), tokens_before);
        let session = handler.registry().get(&token).unwrap();
        assert_eq!(session.frames_processed(), 0);
    }

    #[test]
    fn test_track_ignores_extra_detector_keys() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);
        let body = r#"{"boxes": [[150, 150, 20, 40, 90, 0]], "count": 1, "perf": [1, 2, 3],
                       "resolution": [640, 480]}"#;

        let response = handler.handle(with_session(post(body), &token));
        assert_eq!(response.status, StatusCode::OK);
        let body = response.json_body().unwrap();
        assert_eq!(body["tracked_boxes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_session_id_is_400() {
        let request = post(r#"{"boxes": []}"#)
            .with_header(SESSION_ID_HEADER, HeaderValue::from_static(""));
        let response = handler(4).handle(request);
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json_body().unwrap()["error"], "MISSING_SESSION_ID");
    }

    #[test]
    fn test_delete_requires_session_id() {
        let response = handler(4).handle(HandlerRequest::new(Method::DELETE, "/"));
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_delete_then_delete_again() {
        let handler = handler(4);
        let token = create(&handler, DOOR_CONFIG);

        let first = handler.handle(with_session(HandlerRequest::new(Method::DELETE, "/"), &token));
        assert_eq!(first.status, StatusCode::OK);
        assert_eq!(first.json_body().unwrap()["sessions"], json!([]));

        let second = handler.handle(with_session(HandlerRequest::new(Method::DELETE, "/"), &token));
        assert_eq!(second.status, StatusCode::NOT_FOUND);

        let track = handler.handle(with_session(post(r#"{"boxes": []}"#), &token));
        assert_eq!(track.status, StatusCode::NOT_FOUND);
    }
}
