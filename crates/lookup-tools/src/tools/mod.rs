//! Agent Tools
//!
//! `agent_core::Tool` implementations over a `LookupSource`. Names and
//! descriptions are what the model sees, so they stay stable.

mod arxiv;
mod search;
mod wikipedia;

pub use arxiv::ArxivTool;
pub use search::SearchTool;
pub use wikipedia::WikipediaTool;

use agent_core::{ToolCall, ToolResult};

/// Successful result carrying the call id through
fn reply(call: &ToolCall, output: impl Into<String>) -> ToolResult {
    let result = ToolResult::success(call.name.clone(), output);
    match &call.id {
        Some(id) => result.with_id(id.clone()),
        None => result,
    }
}
