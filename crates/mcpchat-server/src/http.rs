//! Routes
//!
//! - `POST /open`: resolve or create a session, return its display history
//! - `POST /`: stream one turn as line frames
//! - `DELETE /{session_id}`: drop a session
//! - `GET /health`
//!
//! The caller's identity comes from the `x-owner-id` header; a bearer token,
//! when present, is forwarded to tool providers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use mcpchat_core::session::OpenMode;
use mcpchat_core::{ChannelSink, ChatError, ChatMessage, ChatService, SessionScope};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Header carrying the caller's identity
pub const OWNER_HEADER: &str = "x-owner-id";

/// Frames buffered between the turn task and the response body
const FRAME_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Chat(#[from] ChatError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chat(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (code, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/open", post(open_session))
        .route("/", post(send_message))
        .route("/{session_id}", delete(delete_session))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub block_name: Option<String>,
    #[serde(default)]
    pub step_name: Option<String>,
    #[serde(default)]
    pub action_name: Option<String>,
    /// Fail instead of creating when nothing resolves
    #[serde(default)]
    pub resume: bool,
}

impl OpenRequest {
    fn scope(&self) -> Option<SessionScope> {
        let workflow_id = self.workflow_id.as_deref().filter(|w| !w.trim().is_empty())?;
        let mut scope = SessionScope::workflow(workflow_id);
        scope.block_name = self.block_name.clone();
        scope.step_name = self.step_name.clone();
        scope.action_name = self.action_name.clone();
        Some(scope)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub session_id: String,
    pub message: String,
}

fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", OWNER_HEADER)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

async fn open_session(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<OpenRequest>,
) -> Result<Json<OpenResponse>, ApiError> {
    let owner = owner_id(&headers)?;
    let mode = if req.resume {
        OpenMode::ResumeOnly
    } else {
        OpenMode::ResumeOrCreate
    };
    let opened = st
        .service
        .open(&owner, req.session_id.as_deref(), req.scope(), mode)
        .await?;

    Ok(Json(OpenResponse {
        session_id: opened.session.session_id,
        messages: opened.history,
    }))
}

async fn send_message(
    State(st): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendRequest>,
) -> Result<Response, ApiError> {
    let owner = owner_id(&headers)?;
    if req.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("sessionId cannot be empty".to_string()));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message cannot be empty".to_string()));
    }

    let turn = st
        .service
        .prepare_turn(&owner, &req.session_id, &req.message, bearer_token(&headers))
        .await?;

    let (sink, rx) = ChannelSink::channel(FRAME_BUFFER);
    let service = Arc::clone(&st.service);
    tokio::spawn(async move {
        let outcome = service.run_turn(turn, Box::new(sink)).await;
        tracing::debug!(
            session_id = %outcome.session_id,
            steps = outcome.steps,
            end = ?outcome.end,
            "turn finished"
        );
    });

    Ok(frame_response(frame_body(rx)))
}

async fn delete_session(
    State(st): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    st.service.delete(&session_id).await?;
    Ok(StatusCode::OK)
}

fn frame_body(
    mut rx: mpsc::Receiver<String>,
) -> impl futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        while let Some(line) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(Bytes::from(line));
        }
    }
}

fn frame_response<S>(stream: S) -> Response
where
    S: futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::HeaderName::from_static("x-vercel-ai-data-stream"),
        HeaderValue::from_static("v1"),
    );
    (headers, Body::from_stream(stream)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_scope_requires_workflow() {
        let req = OpenRequest {
            block_name: Some("b".into()),
            ..Default::default()
        };
        assert!(req.scope().is_none());

        let req = OpenRequest {
            workflow_id: Some("w1".into()),
            step_name: Some("s".into()),
            ..Default::default()
        };
        let scope = req.scope().unwrap();
        assert_eq!(scope.workflow_id, "w1");
        assert_eq!(scope.step_name.as_deref(), Some("s"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_none());
    }

    #[test]
    fn test_owner_header_required() {
        let mut headers = HeaderMap::new();
        assert!(matches!(owner_id(&headers), Err(ApiError::BadRequest(_))));
        headers.insert(OWNER_HEADER, HeaderValue::from_static(" u1 "));
        assert_eq!(owner_id(&headers).unwrap(), "u1");
    }

    #[tokio::test]
    async fn test_frame_body_ends_when_sender_drops() {
        let (tx, rx) = mpsc::channel::<String>(4);
        let stream = frame_body(rx);
        tokio::pin!(stream);

        tx.send("f:{}\n".to_string()).await.unwrap();
        tx.send("0:\"a\"\n".to_string()).await.unwrap();
        drop(tx);

        let items: Vec<Bytes> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(items, vec![Bytes::from("f:{}\n"), Bytes::from("0:\"a\"\n")]);
    }
}
