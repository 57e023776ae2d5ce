//! # agent-runtime
//!
//! Runtime providers for the search bot.
//!
//! ## Providers
//!
//! - **Gemini** (default): Google's hosted models via the Generative Language REST API
//! - **OpenAI** (coming soon): OpenAI API integration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::gemini::{GeminiConfig, GeminiProviderFactory};
//!
//! let factory = GeminiProviderFactory::new(GeminiConfig::from_env())?;
//! let agent = AgentBuilder::new()
//!     .provider(factory.create(&api_key))
//!     .model("gemini-1.5-flash")
//!     .build()?;
//! ```

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider, GeminiProviderFactory, GEMINI_MODELS};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentError, LlmProvider, Message, ProviderFactory, Result, Role, Session, Tool,
    ToolRegistry,
};
