//! HTTP/WebSocket Handlers

use axum::{
    extract::{Path, State, WebSocketUpgrade, ws::{Message as WsMessage, WebSocket}},
    http::StatusCode,
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use agent_core::{
    session::ChatSettings, AgentBuilder, AgentError, AgentEvent, AgentStep, EventSink, Message,
    Session, SessionId, SessionStore,
};
use lookup_tools::TOOL_LABELS;

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sessions: usize,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}

/// What the UI renders for a session; the key itself never leaves the server
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: String,
    pub api_key_set: bool,
    pub model: String,
    pub temperature: f32,
    pub transcript: Vec<Message>,
    pub input_enabled: bool,
    pub tools: Vec<&'static str>,
    pub caption: String,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            api_key_set: session.credentials.is_set(),
            model: session.settings.model.clone(),
            temperature: session.settings.temperature,
            transcript: session.transcript.messages().to_vec(),
            input_enabled: session.input_enabled(),
            tools: TOOL_LABELS.to_vec(),
            caption: format!(
                "Using model: `{}` | Tools: {}",
                session.settings.model,
                TOOL_LABELS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub steps: Vec<AgentStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn status_of(err: &AgentError) -> (StatusCode, &'static str) {
    match err {
        AgentError::Session(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
        AgentError::KeyRequired => (StatusCode::CONFLICT, "KEY_REQUIRED"),
        AgentError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
}

fn api_error(err: AgentError) -> ApiError {
    let (status, code) = status_of(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

fn not_found(id: &SessionId) -> AgentError {
    AgentError::Session(format!("Unknown session {id}"))
}

/// Run `f` on a session and return the updated view
fn update(
    state: &AppState,
    id: String,
    f: impl FnOnce(&mut Session) -> agent_core::Result<()>,
) -> ApiResult<SessionView> {
    let id = SessionId::from_string(id);
    state
        .sessions
        .modify(&id, |session| {
            f(session)?;
            Ok(SessionView::from(&*session))
        })
        .map(Json)
        .map_err(api_error)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len().unwrap_or_default(),
    })
}

/// Model options for the sidebar radio group
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.config.models.clone(),
        default_model: state.config.default_model.clone(),
    })
}

pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let session = Session::with_settings(ChatSettings {
        model: state.config.default_model.clone(),
        ..ChatSettings::default()
    });
    state.sessions.save(&session).map_err(api_error)?;
    tracing::info!(session = %session.id, "Session created");
    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    let id = SessionId::from_string(id);
    match state.sessions.load(&id).map_err(api_error)? {
        Some(session) => Ok(Json(SessionView::from(&session))),
        None => Err(api_error(not_found(&id))),
    }
}

/// Save the first key, or replace the current one
pub async fn put_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ApiKeyRequest>,
) -> ApiResult<SessionView> {
    update(&state, id, |session| {
        if session.credentials.is_set() {
            session.update_api_key(&payload.api_key)
        } else {
            session.save_api_key(&payload.api_key)
        }
    })
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    update(&state, id, |session| {
        session.clear_api_key();
        Ok(())
    })
}

/// Model and temperature; both apply or neither does
pub async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SettingsRequest>,
) -> ApiResult<SessionView> {
    let options = state.config.models.clone();
    update(&state, id, move |session| {
        let mut next = session.clone();
        if let Some(model) = &payload.model {
            next.select_model(model, &options)?;
        }
        if let Some(temperature) = payload.temperature {
            next.set_temperature(temperature)?;
        }
        *session = next;
        Ok(())
    })
}

pub async fn clear_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SessionView> {
    update(&state, id, Session::clear_history)
}

/// One chat turn; agent failures still answer 200 with the fallback reply
pub async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let id = SessionId::from_string(id);
    run_turn(&state, &id, &payload.message, None)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Record the prompt, run the agent outside the store lock, then record the outcome
async fn run_turn(
    state: &AppState,
    id: &SessionId,
    message: &str,
    sink: Option<&EventSink>,
) -> agent_core::Result<ChatResponse> {
    let (history, settings, api_key) = state.sessions.modify(id, |session| {
        let history = session.begin_turn(message)?;
        let api_key = session
            .credentials
            .api_key()
            .map(String::from)
            .ok_or(AgentError::KeyRequired)?;
        Ok((history, session.settings.clone(), api_key))
    })?;

    tracing::info!(session = %id, model = %settings.model, "Running chat turn");

    let outcome = match AgentBuilder::new()
        .provider(state.providers.create(&api_key))
        .tools(state.tools.clone())
        .model(settings.model.clone())
        .temperature(settings.temperature)
        .max_iterations(state.config.max_iterations)
        .build()
    {
        Ok(agent) => agent.run(&history, sink).await,
        Err(e) => Err(e),
    };

    let (reply, steps, error) = match outcome {
        Ok(run) => (run.answer, run.steps, None),
        Err(e) => {
            tracing::error!(session = %id, error = %e, "Chat turn failed");
            (String::new(), Vec::new(), Some(e.user_message()))
        }
    };

    let session = state.sessions.modify(id, |session| {
        if error.is_some() {
            session.record_failure();
        } else {
            session.record_reply(reply.clone(), steps.len());
        }
        Ok(SessionView::from(&*session))
    })
    .inspect_err(|e| {
        tracing::warn!(session = %id, error = %e, "Session went away during the turn; reply dropped");
    })?;

    let reply = match session.transcript.last() {
        Some(last) if error.is_some() => last.content.clone(),
        _ => reply,
    };

    Ok(ChatResponse {
        reply,
        steps,
        error,
        session,
    })
}

/// WebSocket streaming chat
pub async fn chat_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let id = SessionId::from_string(id);
    ws.on_upgrade(move |socket| handle_stream(socket, state, id))
}

fn frame(value: &serde_json::Value) -> WsMessage {
    WsMessage::Text(value.to_string().into())
}

fn error_frame(err: &AgentError) -> WsMessage {
    let (_, code) = status_of(err);
    frame(&serde_json::json!({
        "type": "error",
        "error": err.user_message(),
        "code": code,
    }))
}

async fn handle_stream(socket: WebSocket, state: AppState, id: SessionId) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        let request: ChatRequest = match serde_json::from_str(&msg) {
            Ok(r) => r,
            Err(e) => {
                let _ = sender
                    .send(error_frame(&AgentError::InvalidInput(e.to_string())))
                    .await;
                continue;
            }
        };

        let (tx, rx) = mpsc::unbounded_channel::<AgentEvent>();
        let turn = {
            let state = state.clone();
            let id = id.clone();
            tokio::spawn(async move { run_turn(&state, &id, &request.message, Some(&tx)).await })
        };

        // Ends once the turn finishes and drops its sender
        let mut events = UnboundedReceiverStream::new(rx);
        let mut client_gone = false;
        while let Some(event) = events.next().await {
            let Ok(value) = serde_json::to_value(&event) else {
                continue;
            };
            if sender.send(frame(&value)).await.is_err() {
                client_gone = true;
                break;
            }
        }

        let last = match turn.await {
            Ok(Ok(response)) => frame(&serde_json::json!({
                "type": "done",
                "reply": response.reply,
                "error": response.error,
                "session": response.session,
            })),
            Ok(Err(e)) => error_frame(&e),
            Err(e) => error_frame(&AgentError::Other(format!("chat turn panicked: {e}"))),
        };
        if client_gone || sender.send(last).await.is_err() {
            break;
        }
    }
}
