//! Session Management
//!
//! One chat session per browser tab: the transcript, the credential the user
//! typed in, and the model settings from the sidebar. Controls that the UI
//! disables until a key is saved are rejected here with `KeyRequired`.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Message, MessageMetadata, Role, Transcript};

/// First assistant message of a new session
pub const GREETING: &str = "Hi there! I'm a chatbot connected to the web (via DuckDuckGo, Wikipedia, Arxiv). How can I assist you today?";

/// Seed message after the user clears the chat
pub const CLEARED: &str = "Chat history cleared! How can I help you next?";

/// Replacement seed once a key is saved over the key prompt
pub const KEY_SAVED: &str = "API Key saved! How can I assist you today?";

/// Recorded in place of an answer when a turn fails
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error and couldn't complete your request. Please check the API key and model settings, or try again later.";

/// Validation message for an empty key
pub const INVALID_KEY: &str = "Please enter a valid Google API key.";

const KEY_PROMPT_MARKER: &str = "Please enter your Google Gemini API Key";

/// Default model selection
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user's API key, if one has been saved
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<String>,
}

impl Credentials {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.is_set() { "Some(***)" } else { "None" };
        f.debug_struct("Credentials").field("api_key", &shown).finish()
    }
}

/// Sidebar model settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// A complete chat session
#[derive(Clone, Debug)]
pub struct Session {
    /// Unique identifier
    pub id: SessionId,

    /// Chat history shown to the user
    pub transcript: Transcript,

    /// Saved API key
    pub credentials: Credentials,

    /// Model and temperature
    pub settings: ChatSettings,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with the greeting and default settings
    pub fn new() -> Self {
        Self::with_settings(ChatSettings::default())
    }

    /// Create with specific initial settings
    pub fn with_settings(settings: ChatSettings) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            transcript: Transcript::seeded(GREETING),
            credentials: Credentials::default(),
            settings,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Whether chat input and the model controls are usable
    pub fn input_enabled(&self) -> bool {
        self.credentials.is_set()
    }

    fn require_key(&self) -> Result<()> {
        if self.input_enabled() {
            Ok(())
        } else {
            Err(AgentError::KeyRequired)
        }
    }

    fn checked_key(key: &str) -> Result<String> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AgentError::InvalidInput(INVALID_KEY.into()));
        }
        Ok(key.to_string())
    }

    /// Save the first key, enabling input
    pub fn save_api_key(&mut self, key: &str) -> Result<()> {
        let key = Self::checked_key(key)?;
        self.credentials.api_key = Some(key);

        let prompted = self.transcript.len() == 1
            && self
                .transcript
                .last()
                .is_some_and(|m| m.content.contains(KEY_PROMPT_MARKER));
        if prompted {
            self.transcript.replace_single(KEY_SAVED);
        }

        tracing::info!(session = %self.id, "API key saved");
        self.touch();
        Ok(())
    }

    /// Replace an already saved key
    pub fn update_api_key(&mut self, key: &str) -> Result<()> {
        self.require_key()?;
        let key = Self::checked_key(key)?;
        self.credentials.api_key = Some(key);
        tracing::info!(session = %self.id, "API key updated");
        self.touch();
        Ok(())
    }

    /// Forget the key; input is disabled again
    pub fn clear_api_key(&mut self) {
        self.credentials.api_key = None;
        tracing::info!(session = %self.id, "API key cleared");
        self.touch();
    }

    /// Pick one of the offered models
    pub fn select_model(&mut self, model: &str, options: &[String]) -> Result<()> {
        self.require_key()?;
        let model = model.strip_prefix("models/").unwrap_or(model);
        if !options.iter().any(|o| o == model) {
            return Err(AgentError::InvalidInput(format!(
                "Unknown model '{}'. Choose one of: {}",
                model,
                options.join(", ")
            )));
        }
        self.settings.model = model.to_string();
        self.touch();
        Ok(())
    }

    /// Set temperature in [0, 1], snapped to steps of 0.1
    pub fn set_temperature(&mut self, temperature: f32) -> Result<()> {
        self.require_key()?;
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(AgentError::InvalidInput(format!(
                "Temperature must be between 0.0 and 1.0 (got {temperature})"
            )));
        }
        self.settings.temperature = (temperature * 10.0).round() / 10.0;
        self.touch();
        Ok(())
    }

    /// Reset the transcript to a single seed message
    pub fn clear_history(&mut self) -> Result<()> {
        self.require_key()?;
        self.transcript.reset(CLEARED);
        self.touch();
        Ok(())
    }

    /// Record the user's prompt and return what the agent should see
    pub fn begin_turn(&mut self, prompt: &str) -> Result<Vec<Message>> {
        self.require_key()?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AgentError::InvalidInput("Message cannot be empty".into()));
        }
        self.transcript.push(Message::user(prompt));
        self.touch();
        Ok(self.transcript.messages().to_vec())
    }

    /// Append the agent's answer
    pub fn record_reply(&mut self, reply: impl Into<String>, tool_calls: usize) {
        let metadata = MessageMetadata {
            model: Some(self.settings.model.clone()),
            tool_calls: Some(tool_calls),
            fallback: false,
        };
        self.transcript
            .push(Message::assistant(reply).with_metadata(metadata));
        self.touch();
    }

    /// Append the canned apology after a failed turn
    pub fn record_failure(&mut self) {
        let metadata = MessageMetadata {
            fallback: true,
            ..Default::default()
        };
        self.transcript
            .push(Message::assistant(FALLBACK_REPLY).with_metadata(metadata));
        self.touch();
    }

    /// Number of user turns so far
    pub fn turn_count(&self) -> usize {
        self.transcript
            .messages()
            .iter()
            .filter(|m| m.role == Role::User)
            .count()
    }

    /// Time since last activity
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.updated_at
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    /// Save a session
    fn save(&self, session: &Session) -> Result<()>;

    /// Load a session by ID
    fn load(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Delete a session
    fn delete(&self, id: &SessionId) -> Result<()>;
}

/// In-memory session store; sessions live as long as the process
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .read()
            .map_err(|_| AgentError::Session("session store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .write()
            .map_err(|_| AgentError::Session("session store lock poisoned".into()))
    }

    /// Apply `f` to a session under the write lock
    pub fn modify<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.write()?;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AgentError::Session(format!("Unknown session {id}")))?;
        f(session)
    }

    /// Drop sessions idle longer than `max_idle`; returns how many went
    pub fn prune_idle(&self, max_idle: chrono::Duration) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for(now) <= max_idle);
        Ok(before - sessions.len())
    }

    /// Number of live sessions
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        self.write()?.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn delete(&self, id: &SessionId) -> Result<()> {
        self.write()?.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        ["gemini-1.5-pro", "gemini-1.5-flash", "gemini-2.0-flash-lite", "gemini-2.0-flash"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn keyed() -> Session {
        let mut session = Session::new();
        session.save_api_key("AIza-test").unwrap();
        session
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new();
        assert!(!session.input_enabled());
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.messages()[0].content, GREETING);
        assert_eq!(session.settings.model, "gemini-1.5-pro");
        assert!((session.settings.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_controls_disabled_until_key_saved() {
        let mut session = Session::new();
        assert!(matches!(session.begin_turn("hi"), Err(AgentError::KeyRequired)));
        assert!(matches!(session.clear_history(), Err(AgentError::KeyRequired)));
        assert!(matches!(session.set_temperature(0.2), Err(AgentError::KeyRequired)));
        assert!(matches!(
            session.select_model("gemini-1.5-flash", &options()),
            Err(AgentError::KeyRequired)
        ));
        assert!(matches!(session.update_api_key("x"), Err(AgentError::KeyRequired)));
        assert_eq!(session.transcript.len(), 1);
    }

    #[test]
    fn test_save_rejects_blank_key() {
        let mut session = Session::new();
        let err = session.save_api_key("   ").unwrap_err();
        assert_eq!(err.to_string(), INVALID_KEY);
        assert!(!session.input_enabled());
    }

    #[test]
    fn test_save_replaces_key_prompt_seed() {
        let mut session = Session::new();
        session.transcript.reset("Please enter your Google Gemini API Key in the sidebar.");
        session.save_api_key("AIza-test").unwrap();
        assert_eq!(session.transcript.messages()[0].content, KEY_SAVED);

        // The ordinary greeting is left alone
        let session = keyed();
        assert_eq!(session.transcript.messages()[0].content, GREETING);
    }

    #[test]
    fn test_update_and_clear_key() {
        let mut session = keyed();
        assert!(session.update_api_key("").is_err());
        session.update_api_key("AIza-other").unwrap();
        assert_eq!(session.credentials.api_key(), Some("AIza-other"));

        session.clear_api_key();
        assert!(!session.input_enabled());
        assert!(session.credentials.api_key().is_none());
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let session = keyed();
        let debug = format!("{:?}", session.credentials);
        assert!(!debug.contains("AIza"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_model_and_temperature() {
        let mut session = keyed();
        session.select_model("models/gemini-2.0-flash", &options()).unwrap();
        assert_eq!(session.settings.model, "gemini-2.0-flash");
        assert!(session.select_model("gpt-4", &options()).is_err());

        session.set_temperature(0.34).unwrap();
        assert!((session.settings.temperature - 0.3).abs() < 1e-6);
        assert!(session.set_temperature(1.5).is_err());
        assert!(session.set_temperature(f32::NAN).is_err());
    }

    #[test]
    fn test_turns_and_clear() {
        let mut session = keyed();
        let snapshot = session.begin_turn("  What is Rust?  ").unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].content, "What is Rust?");
        assert!(matches!(session.begin_turn(" "), Err(AgentError::InvalidInput(_))));

        session.record_reply("A systems language.", 1);
        session.begin_turn("And Go?").unwrap();
        session.record_failure();
        assert_eq!(session.turn_count(), 2);
        let last = session.transcript.last().unwrap();
        assert_eq!(last.content, FALLBACK_REPLY);
        assert!(last.metadata.as_ref().unwrap().fallback);

        session.clear_history().unwrap();
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript.messages()[0].content, CLEARED);
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        let session = Session::new();
        let id = session.id.clone();

        store.save(&session).unwrap();

        let loaded = store.load(&id).unwrap();
        assert!(loaded.is_some());
        assert_eq!(loaded.unwrap().id, id);

        store.modify(&id, |s| s.save_api_key("AIza-test")).unwrap();
        assert!(store.load(&id).unwrap().unwrap().input_enabled());

        let missing = store.modify(&SessionId::new(), |_| Ok(()));
        assert!(matches!(missing, Err(AgentError::Session(_))));

        store.delete(&id).unwrap();
        assert!(store.load(&id).unwrap().is_none());
    }

    #[test]
    fn test_prune_idle() {
        let store = MemorySessionStore::new();
        let fresh = Session::new();
        let mut stale = Session::new();
        stale.updated_at = Utc::now() - chrono::Duration::hours(5);
        store.save(&fresh).unwrap();
        store.save(&stale).unwrap();

        let removed = store.prune_idle(chrono::Duration::hours(2)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.load(&fresh.id).unwrap().is_some());
    }
}
