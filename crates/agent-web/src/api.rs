//! API Client

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

const SESSION_KEY: &str = "search-bot.session";

/// Transcript entry as the server sends it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SessionView {
    pub id: String,
    pub api_key_set: bool,
    pub model: String,
    pub temperature: f32,
    pub transcript: Vec<ChatMessage>,
    pub input_enabled: bool,
    pub caption: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Models {
    pub models: Vec<String>,
    pub default_model: String,
}

/// One Thought/Action/Observation round behind a reply
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AgentStep {
    #[serde(default)]
    pub thought: String,
    pub tool: String,
    pub tool_input: String,
    pub observation: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub steps: Vec<AgentStep>,
    #[serde(default)]
    pub error: Option<String>,
    pub session: SessionView,
}

/// Failed request: server message plus its error code, if any
#[derive(Clone, Debug)]
pub struct ApiError {
    pub message: String,
    pub code: Option<String>,
}

impl ApiError {
    fn network(err: &reqwest::Error) -> Self {
        Self {
            message: err.to_string(),
            code: None,
        }
    }

    pub fn is_missing_session(&self) -> bool {
        self.code.as_deref() == Some("SESSION_NOT_FOUND")
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// reqwest on wasm needs absolute URLs
fn url(path: &str) -> String {
    let origin = web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into());
    format!("{origin}{path}")
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
    if response.status().is_success() {
        return response.json().await.map_err(|e| ApiError::network(&e));
    }
    let data: serde_json::Value = response.json().await.unwrap_or_default();
    Err(ApiError {
        message: data["error"].as_str().unwrap_or("Request failed").to_string(),
        code: data["code"].as_str().map(String::from),
    })
}

async fn send<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> ApiResult<T> {
    let response = request.send().await.map_err(|e| ApiError::network(&e))?;
    read(response).await
}

pub async fn list_models() -> ApiResult<Models> {
    send(reqwest::Client::new().get(url("/api/models"))).await
}

pub async fn create_session() -> ApiResult<SessionView> {
    send(reqwest::Client::new().post(url("/api/sessions"))).await
}

pub async fn get_session(id: &str) -> ApiResult<SessionView> {
    send(reqwest::Client::new().get(url(&format!("/api/sessions/{id}")))).await
}

pub async fn put_api_key(id: &str, api_key: &str) -> ApiResult<SessionView> {
    let body = serde_json::json!({ "api_key": api_key });
    send(
        reqwest::Client::new()
            .put(url(&format!("/api/sessions/{id}/api-key")))
            .json(&body),
    )
    .await
}

pub async fn delete_api_key(id: &str) -> ApiResult<SessionView> {
    send(reqwest::Client::new().delete(url(&format!("/api/sessions/{id}/api-key")))).await
}

pub async fn update_settings(
    id: &str,
    model: Option<String>,
    temperature: Option<f32>,
) -> ApiResult<SessionView> {
    let body = serde_json::json!({ "model": model, "temperature": temperature });
    send(
        reqwest::Client::new()
            .put(url(&format!("/api/sessions/{id}/settings")))
            .json(&body),
    )
    .await
}

pub async fn clear_history(id: &str) -> ApiResult<SessionView> {
    send(reqwest::Client::new().post(url(&format!("/api/sessions/{id}/clear")))).await
}

/// Send a chat message to the backend
pub async fn send_chat(id: &str, message: &str) -> ApiResult<ChatReply> {
    let body = serde_json::json!({ "message": message });
    send(
        reqwest::Client::new()
            .post(url(&format!("/api/sessions/{id}/chat")))
            .json(&body),
    )
    .await
}

fn storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok()?
}

/// Session id kept from an earlier visit
pub fn stored_session_id() -> Option<String> {
    storage()?.get_item(SESSION_KEY).ok()?
}

pub fn store_session_id(id: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(SESSION_KEY, id);
    }
}

/// Resume the stored session, or start a fresh one
pub async fn resume_or_create() -> ApiResult<SessionView> {
    if let Some(id) = stored_session_id() {
        match get_session(&id).await {
            Ok(session) => return Ok(session),
            Err(e) if e.is_missing_session() => {}
            Err(e) => return Err(e),
        }
    }
    let session = create_session().await?;
    store_session_id(&session.id);
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_reply_carries_steps() {
        let reply: ChatReply = serde_json::from_value(serde_json::json!({
            "reply": "Rust 1.83.",
            "steps": [{
                "thought": "I should search.",
                "tool": "Search",
                "tool_input": "latest rust",
                "observation": "Rust 1.83 was released."
            }],
            "session": {
                "id": "abc",
                "api_key_set": true,
                "model": "gemini-1.5-pro",
                "temperature": 0.7,
                "transcript": [
                    { "role": "assistant", "content": "Rust 1.83.", "timestamp": "2024-11-28T10:00:00Z" }
                ],
                "input_enabled": true,
                "tools": ["DuckDuckGo", "Wikipedia", "Arxiv"],
                "caption": "Using model: `gemini-1.5-pro` | Tools: DuckDuckGo, Wikipedia, Arxiv"
            }
        }))
        .unwrap();

        assert_eq!(reply.steps.len(), 1);
        assert_eq!(reply.steps[0].tool, "Search");
        assert!(reply.error.is_none());
        assert_eq!(reply.session.transcript[0].content, "Rust 1.83.");
    }

    #[test]
    fn test_failed_reply_without_steps() {
        let reply: ChatReply = serde_json::from_value(serde_json::json!({
            "reply": "Sorry",
            "steps": [],
            "error": "Authentication failed. Please check your API key.",
            "session": {
                "id": "abc", "api_key_set": true, "model": "gemini-1.5-pro",
                "temperature": 0.7, "transcript": [], "input_enabled": true, "caption": ""
            }
        }))
        .unwrap();
        assert!(reply.steps.is_empty());
        assert_eq!(reply.error.as_deref(), Some("Authentication failed. Please check your API key."));
    }

    #[test]
    fn test_missing_session_code() {
        let err = ApiError {
            message: "gone".into(),
            code: Some("SESSION_NOT_FOUND".into()),
        };
        assert!(err.is_missing_session());
    }
}
