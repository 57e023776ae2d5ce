//! # agent-core
//!
//! Core agent logic for the search bot: a zero-shot ReAct loop over a
//! provider-agnostic LLM abstraction and a registry of lookup tools, plus
//! the per-user chat session that feeds it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Session (transcript, API key, model, temperature)           │
//! │        │ begin_turn                                          │
//! │        ▼                                                     │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐   │
//! │  │   ReAct     │  │    Tools    │  │   LlmProvider       │   │
//! │  │   Agent     │──│   Registry  │──│   (Strategy)        │   │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the agent independent of the hosted model;
//! a `ProviderFactory` builds a fresh provider from the credential the user
//! typed into the current session.

pub mod error;
pub mod message;
pub mod mock;
pub mod provider;
pub mod reasoning;
pub mod session;
pub mod tool;

pub use error::{AgentError, Result};
pub use message::{Message, Role, Transcript};
pub use provider::{LlmProvider, ProviderFactory};
pub use reasoning::{Agent, AgentBuilder, AgentEvent, AgentRun, AgentStep, EventSink};
pub use session::{MemorySessionStore, Session, SessionId, SessionStore};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
