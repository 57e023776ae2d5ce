//! Reasoning Loop
//!
//! Zero-shot ReAct agent. The model sees the tool descriptions and a fixed
//! `Thought / Action / Action Input / Observation` format, picks a tool by
//! name and feeds it a free-text input, then reads the observation and goes
//! round again until it writes `Final Answer:`.

use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{AgentError, Result};
use crate::message::{newest_within, Message, Role};
use crate::provider::{GenerationOptions, LlmProvider};
use crate::tool::{ToolCall, ToolRegistry};

/// Observation fed back when the model output cannot be parsed
pub const DEFAULT_PARSE_ERROR_MESSAGE: &str =
    "I encountered an issue parsing the tool output. Please check the format.";

/// Answer returned when the iteration limit is hit
pub const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

const FINAL_ANSWER: &str = "Final Answer:";
const OBSERVATION_STOP: &str = "\nObservation:";
const PARSE_ERROR_TOOL: &str = "_Exception";

const PREFIX: &str =
    "Answer the following questions as best you can. You have access to the following tools:";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const SUFFIX: &str = "Begin!";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("static regex")
});

static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Action\s*\d*\s*:").expect("static regex"));

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum reasoning iterations before giving up
    pub max_iterations: usize,

    /// Generation options
    pub generation: GenerationOptions,

    /// Observation used when a model output cannot be parsed
    pub parse_error_message: String,

    /// Token budget for replaying earlier turns into the prompt
    pub history_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            generation: GenerationOptions::default(),
            parse_error_message: DEFAULT_PARSE_ERROR_MESSAGE.into(),
            history_tokens: 2048,
        }
    }
}

/// Progress notifications emitted while the agent works
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Raw text as the model streams it
    LlmToken { delta: String },
    /// Reasoning preceding an action or answer
    Thought { text: String },
    /// A tool is about to run
    ToolStart { tool: String, input: String },
    /// A tool finished (or failed) with this observation
    ToolEnd { tool: String, output: String, success: bool },
    /// The model output did not follow the format
    ParseError { output: String, observation: String },
    /// The run finished
    FinalAnswer { answer: String },
}

/// Receiver side is owned by whoever renders progress (e.g. a WebSocket)
pub type EventSink = mpsc::UnboundedSender<AgentEvent>;

/// One completed Thought/Action/Observation round
#[derive(Clone, Debug, Serialize)]
pub struct AgentStep {
    pub thought: String,
    pub tool: String,
    pub tool_input: String,
    pub observation: String,
}

/// Outcome of a run
#[derive(Clone, Debug, Serialize)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    pub iterations: usize,
}

#[derive(Debug, PartialEq)]
enum ParsedOutput {
    Action { thought: String, tool: String, input: String },
    Finish { thought: String, answer: String },
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Prompt up to and including `Thought:`; the scratchpad is appended per iteration
    fn build_prompt(&self, history: &[Message], question: &str) -> String {
        let tool_names = self.tools.names().join(", ");
        let mut prompt = format!(
            "{PREFIX}\n\n{}\n\n{}\n\n{SUFFIX}\n\n",
            self.tools.describe(),
            FORMAT_INSTRUCTIONS.replace("{tool_names}", &tool_names),
        );

        let history = newest_within(history, self.config.history_tokens);
        if !history.is_empty() {
            prompt.push_str("Previous conversation:\n");
            for message in history {
                let speaker = match message.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                    Role::System => continue,
                };
                prompt.push_str(&format!("{speaker}: {}\n", message.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("Question: {question}\nThought:"));
        prompt
    }

    /// Run the agent over a transcript whose last user message is the question.
    ///
    /// Earlier turns are replayed as context. Tool failures and malformed
    /// model output become observations; only provider failures abort the run.
    pub async fn run(&self, transcript: &[Message], sink: Option<&EventSink>) -> Result<AgentRun> {
        let question_idx = transcript
            .iter()
            .rposition(|m| m.role == Role::User)
            .ok_or_else(|| AgentError::InvalidInput("No user message to answer".into()))?;
        let question = transcript[question_idx].content.trim();
        let base_prompt = self.build_prompt(&transcript[..question_idx], question);

        let mut scratchpad = String::new();
        let mut steps = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            let prompt = format!("{base_prompt}{scratchpad}");
            let output = self.generate(&prompt, sink).await?;

            let (thought, tool, tool_input, observation) = match parse_output(&output) {
                Ok(ParsedOutput::Finish { thought, answer }) => {
                    if !thought.is_empty() {
                        emit(sink, AgentEvent::Thought { text: thought });
                    }
                    tracing::debug!(iterations = iteration, tools_used = steps.len(), "Agent finished");
                    emit(sink, AgentEvent::FinalAnswer { answer: answer.clone() });
                    return Ok(AgentRun {
                        answer,
                        steps,
                        iterations: iteration,
                    });
                }
                Ok(ParsedOutput::Action { thought, tool, input }) => {
                    if !thought.is_empty() {
                        emit(sink, AgentEvent::Thought { text: thought.clone() });
                    }
                    let call = ToolCall::new(&tool, &input);
                    let observation = self.observe(&call, sink).await;
                    (thought, tool, input, observation)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Could not parse model output");
                    let observation = self.config.parse_error_message.clone();
                    emit(
                        sink,
                        AgentEvent::ParseError {
                            output: output.clone(),
                            observation: observation.clone(),
                        },
                    );
                    (String::new(), PARSE_ERROR_TOOL.to_string(), e.to_string(), observation)
                }
            };

            scratchpad.push_str(&format!("{output}\nObservation: {observation}\nThought: "));
            steps.push(AgentStep {
                thought,
                tool,
                tool_input,
                observation,
            });
        }

        tracing::warn!(max = self.config.max_iterations, "Agent hit iteration limit");
        emit(
            sink,
            AgentEvent::FinalAnswer {
                answer: ITERATION_LIMIT_ANSWER.into(),
            },
        );
        Ok(AgentRun {
            answer: ITERATION_LIMIT_ANSWER.into(),
            steps,
            iterations: self.config.max_iterations,
        })
    }

    /// Answer a single question with no prior conversation
    pub async fn ask(&self, question: &str) -> Result<String> {
        let run = self.run(&[Message::user(question)], None).await?;
        Ok(run.answer)
    }

    /// One model call, cut at the observation marker
    async fn generate(&self, prompt: &str, sink: Option<&EventSink>) -> Result<String> {
        let messages = [Message::user(prompt)];
        let mut options = self.config.generation.clone();
        options.stop_sequences = vec![OBSERVATION_STOP.into()];

        let mut text = match sink {
            Some(sink) => {
                let mut stream = self.provider.complete_stream(&messages, &options).await?;
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if !chunk.delta.is_empty() {
                        emit(
                            Some(sink),
                            AgentEvent::LlmToken {
                                delta: chunk.delta.clone(),
                            },
                        );
                        text.push_str(&chunk.delta);
                    }
                    if chunk.done {
                        break;
                    }
                }
                text
            }
            None => self.provider.complete(&messages, &options).await?.content,
        };

        if let Some(idx) = text.find(OBSERVATION_STOP) {
            text.truncate(idx);
        }
        Ok(text)
    }

    /// Run a tool and turn any outcome into observation text
    async fn observe(&self, call: &ToolCall, sink: Option<&EventSink>) -> String {
        tracing::debug!(tool = %call.name, input = %call.input, "Executing tool");
        emit(
            sink,
            AgentEvent::ToolStart {
                tool: call.name.clone(),
                input: call.input.clone(),
            },
        );

        let (output, success) = match self.tools.execute(call).await {
            Ok(result) => (result.output, result.success),
            Err(AgentError::ToolNotFound(name)) => (
                format!(
                    "{name} is not a valid tool, try one of [{}].",
                    self.tools.names().join(", ")
                ),
                false,
            ),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                (format!("Error: {e}"), false)
            }
        };

        emit(
            sink,
            AgentEvent::ToolEnd {
                tool: call.name.clone(),
                output: output.clone(),
                success,
            },
        );
        output
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

fn emit(sink: Option<&EventSink>, event: AgentEvent) {
    if let Some(sink) = sink {
        // Receiver gone just means nobody is watching any more
        let _ = sink.send(event);
    }
}

/// Text before the first marker, without a leading `Thought:`
fn leading_thought(text: &str, marker_at: usize) -> String {
    let head = text[..marker_at].trim();
    head.strip_prefix("Thought:").unwrap_or(head).trim().to_string()
}

fn parse_output(text: &str) -> Result<ParsedOutput> {
    let answer_at = text.find(FINAL_ANSWER);

    if let Some(caps) = ACTION_RE.captures(text) {
        let whole = caps.get(0).map_or(0, |m| m.start());
        return match answer_at {
            // An answer written before a hallucinated action still counts
            Some(at) if at < whole => {
                let start = at + FINAL_ANSWER.len();
                let end = text[start..].find("\n\n").map_or(text.len(), |i| start + i);
                Ok(ParsedOutput::Finish {
                    thought: leading_thought(text, at),
                    answer: text[start..end].trim().to_string(),
                })
            }
            Some(_) => Err(AgentError::Parse(format!(
                "Parsing LLM output produced both a final answer and a parse-able action: {text}"
            ))),
            None => {
                let tool = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
                let input = caps
                    .get(2)
                    .map_or("", |m| m.as_str())
                    .trim_matches(' ')
                    .trim()
                    .trim_matches('"')
                    .to_string();
                Ok(ParsedOutput::Action {
                    thought: leading_thought(text, whole),
                    tool,
                    input,
                })
            }
        };
    }

    if let Some(at) = answer_at {
        let answer = text
            .rsplit(FINAL_ANSWER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(ParsedOutput::Finish {
            thought: leading_thought(text, at),
            answer,
        });
    }

    if ACTION_ONLY_RE.is_match(text) {
        Err(AgentError::Parse(format!(
            "Invalid Format: Missing 'Action Input:' after 'Action:' in `{}`",
            text.trim()
        )))
    } else {
        Err(AgentError::Parse(format!(
            "Invalid Format: Missing 'Action:' after 'Thought:' in `{}`",
            text.trim()
        )))
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Option<Arc<ToolRegistry>>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: None,
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn parse_error_message(mut self, message: impl Into<String>) -> Self {
        self.config.parse_error_message = message.into();
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(
            provider,
            self.tools.unwrap_or_default(),
            self.config,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedProvider;
    use crate::tool::{Tool, ToolResult, ToolSchema};
    use async_trait::async_trait;

    struct FixedTool {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for FixedTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: self.name.into(),
                description: format!("Looks things up in {}", self.name),
                label: None,
            }
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
            Ok(ToolResult::success(self.name, format!("{} for {}", self.reply, call.input)))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "arxiv".into(),
                description: "Always fails".into(),
                label: None,
            }
        }

        async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
            Err(AgentError::ToolExecution("connection reset".into()))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut tools = ToolRegistry::new();
        tools.register(FixedTool { name: "Search", reply: "snippets" });
        tools.register(FixedTool { name: "wikipedia", reply: "summary" });
        Arc::new(tools)
    }

    fn agent(provider: Arc<ScriptedProvider>) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(registry())
            .max_iterations(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_action() {
        let parsed = parse_output(
            "I should look this up.\nAction: Search\nAction Input: \"rust 2024 edition\"",
        )
        .unwrap();
        assert_eq!(
            parsed,
            ParsedOutput::Action {
                thought: "I should look this up.".into(),
                tool: "Search".into(),
                input: "rust 2024 edition".into(),
            }
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let parsed = parse_output("Thought: I now know the final answer\nFinal Answer: 42").unwrap();
        assert_eq!(
            parsed,
            ParsedOutput::Finish {
                thought: "I now know the final answer".into(),
                answer: "42".into(),
            }
        );
    }

    #[test]
    fn test_parse_answer_before_hallucinated_action() {
        let parsed = parse_output(
            "Final Answer: Paris\n\nAction: Search\nAction Input: capital of France",
        )
        .unwrap();
        assert!(matches!(parsed, ParsedOutput::Finish { answer, .. } if answer == "Paris"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_output("Action: Search\nAction Input: x\nFinal Answer: y").is_err());
        assert!(parse_output("Action: Search").is_err());
        assert!(parse_output("just some chatter").is_err());
    }

    #[tokio::test]
    async fn test_run_uses_tool_then_answers() {
        let provider = Arc::new(ScriptedProvider::new([
            "I need to search.\nAction: Search\nAction Input: tallest building",
            "I now know the final answer\nFinal Answer: The Burj Khalifa.",
        ]));
        let agent = agent(provider.clone());

        let run = agent
            .run(&[Message::assistant("Hi!"), Message::user("What is the tallest building?")], None)
            .await
            .unwrap();

        assert_eq!(run.answer, "The Burj Khalifa.");
        assert_eq!(run.iterations, 2);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].tool, "Search");
        assert_eq!(run.steps[0].observation, "snippets for tallest building");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("should be one of [Search, wikipedia]"));
        assert!(prompts[0].contains("Previous conversation:\nAssistant: Hi!"));
        assert!(prompts[0].ends_with("Question: What is the tallest building?\nThought:"));
        assert!(prompts[1].contains("Observation: snippets for tallest building\nThought: "));

        let options = provider.last_options().unwrap();
        assert_eq!(options.stop_sequences, vec!["\nObservation:".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_parse_error_become_observations() {
        let provider = Arc::new(ScriptedProvider::new([
            "Action: Bing\nAction Input: weather",
            "I am not sure what to do",
            "Final Answer: done",
        ]));
        let run = agent(provider.clone()).ask("weather?").await;
        assert_eq!(run.unwrap(), "done");

        let prompts = provider.prompts();
        assert!(prompts[1].contains(
            "Observation: Bing is not a valid tool, try one of [Search, wikipedia]."
        ));
        assert!(prompts[2].contains(&format!("Observation: {DEFAULT_PARSE_ERROR_MESSAGE}")));
    }

    #[tokio::test]
    async fn test_tool_error_becomes_observation() {
        let mut tools = ToolRegistry::new();
        tools.register(BrokenTool);
        let provider = Arc::new(ScriptedProvider::new([
            "Action: arxiv\nAction Input: transformers",
            "Final Answer: could not reach arxiv",
        ]));
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .tools(Arc::new(tools))
            .build()
            .unwrap();

        let run = agent.run(&[Message::user("papers?")], None).await.unwrap();
        assert_eq!(run.steps[0].observation, "Error: Tool execution error: connection reset");
    }

    #[tokio::test]
    async fn test_iteration_limit_answer() {
        let provider = Arc::new(ScriptedProvider::repeating(
            "Action: Search\nAction Input: again",
        ));
        let run = agent(provider).run(&[Message::user("loop")], None).await.unwrap();
        assert_eq!(run.answer, ITERATION_LIMIT_ANSWER);
        assert_eq!(run.steps.len(), 4);
    }

    #[tokio::test]
    async fn test_stream_events_and_stop_cut() {
        let provider = Arc::new(ScriptedProvider::new([
            "Look it up\nAction: wikipedia\nAction Input: Ada Lovelace\nObservation: made up",
            "Final Answer: A mathematician.",
        ]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = agent(provider).run(&[Message::user("Who was Ada?")], Some(&tx)).await.unwrap();
        drop(tx);

        assert_eq!(run.steps[0].observation, "summary for Ada Lovelace");

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(events.iter().any(|e| matches!(e, AgentEvent::LlmToken { .. })));
        assert!(events.contains(&AgentEvent::ToolStart {
            tool: "wikipedia".into(),
            input: "Ada Lovelace".into(),
        }));
        assert_eq!(
            events.last(),
            Some(&AgentEvent::FinalAnswer {
                answer: "A mathematician.".into()
            })
        );
    }

    #[tokio::test]
    async fn test_run_completes_after_watcher_leaves() {
        let provider = Arc::new(ScriptedProvider::new([
            "Look it up\nAction: wikipedia\nAction Input: Ada Lovelace",
            "Final Answer: A mathematician.",
        ]));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let run = agent(provider).run(&[Message::user("Who was Ada?")], Some(&tx)).await.unwrap();
        assert_eq!(run.answer, "A mathematician.");
        assert_eq!(run.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_provider_error_aborts() {
        let provider = Arc::new(ScriptedProvider::failing(|| AgentError::Auth("API_KEY_INVALID".into())));
        let err = agent(provider).ask("hello").await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[test]
    fn test_builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
