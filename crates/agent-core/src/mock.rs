//! Scripted LLM Provider
//!
//! Replays canned model outputs in order. Used by tests across the workspace
//! and handy for running the server without a Gemini key.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::stream;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{
    Completion, CompletionStream, FinishReason, GenerationOptions, LlmProvider, ModelInfo,
    ProviderInfo, StreamChunk,
};

type ErrorFactory = Box<dyn Fn() -> AgentError + Send + Sync>;

#[derive(Default)]
struct Recorded {
    prompts: Vec<String>,
    options: Vec<GenerationOptions>,
}

/// Provider that answers from a fixed script
pub struct ScriptedProvider {
    script: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    failure: Option<ErrorFactory>,
    recorded: Mutex<Recorded>,
}

impl ScriptedProvider {
    /// Answer with each output once, in order
    pub fn new<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: Mutex::new(outputs.into_iter().map(Into::into).collect()),
            repeat: None,
            failure: None,
            recorded: Mutex::default(),
        }
    }

    /// Answer every call with the same output
    pub fn repeating(output: impl Into<String>) -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.repeat = Some(output.into());
        provider
    }

    /// Fail every call
    pub fn failing(make_error: impl Fn() -> AgentError + Send + Sync + 'static) -> Self {
        let mut provider = Self::new(Vec::<String>::new());
        provider.failure = Some(Box::new(make_error));
        provider
    }

    /// Prompt text of every call so far
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.recorded).prompts.clone()
    }

    /// Options of the most recent call
    pub fn last_options(&self) -> Option<GenerationOptions> {
        lock(&self.recorded).options.last().cloned()
    }

    fn next_output(&self, messages: &[Message], options: &GenerationOptions) -> Result<String> {
        {
            let mut recorded = lock(&self.recorded);
            recorded.prompts.push(
                messages
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
            recorded.options.push(options.clone());
        }

        if let Some(make_error) = &self.failure {
            return Err(make_error());
        }
        if let Some(output) = lock(&self.script).pop_front() {
            return Ok(output);
        }
        self.repeat
            .clone()
            .ok_or_else(|| AgentError::Provider("scripted provider ran out of outputs".into()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "Scripted".into(),
            models: self.list_models().await?,
            supports_streaming: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.failure.is_none())
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let content = self.next_output(messages, options)?;
        Ok(Completion {
            content,
            model: options.model.clone(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<CompletionStream> {
        let content = self.next_output(messages, options)?;

        // Word-sized pieces, like a real token stream
        let mut chunks: Vec<Result<StreamChunk>> = content
            .split_inclusive(' ')
            .map(|piece| {
                Ok(StreamChunk {
                    delta: piece.to_string(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        chunks.push(Ok(StreamChunk {
            delta: String::new(),
            done: true,
            usage: None,
        }));

        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted".into(),
            name: "Scripted".into(),
            context_length: None,
        }])
    }
}
