//! Agent loop — iterative LLM-call / tool-dispatch engine.
//!
//! This is the default [`AgentExecutor`] implementation: given a task's
//! history, it repeatedly calls an injected [`LlmClient`], executes any tool
//! calls the model requests through a [`ToolRegistry`], and folds the results
//! back into history until the model produces a plain text reply, asks for
//! input, or the iteration budget is exhausted.
//!
//! The LLM itself is a capability boundary ([`LlmClient`]) — this module ships
//! one reference implementation, [`EchoLlmClient`], used by tests and the
//! bundled demo binary. Binding to a concrete hosted model is left to callers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{A2AError, A2AResult};
use crate::types::{Message, Part, Role};

use super::agent_executor::{AgentExecutor, RequestContext};
use super::event_queue::EventQueue;
use super::task_updater::TaskUpdater;

/// Prefix a tool result uses to signal that the loop should pause and ask
/// the user for more information. The text after the prefix becomes the
/// `input-required` prompt.
///
/// This is a wire-level contract between a [`Tool::execute`] body and the
/// [`AgentLoop`] that calls it — the loop never leaks the raw sentinel past
/// its own boundary, it converts it into [`AgentOutcome::InputRequired`].
pub const INPUT_REQUIRED_SENTINEL: &str = "INPUT_REQUIRED:";

/// The result of one [`AgentLoop::run`] invocation.
#[derive(Debug, Clone)]
pub enum AgentOutcome {
    /// The agent produced a final answer.
    Completed(Message),
    /// The agent needs more information from the user before it can continue.
    InputRequired(String),
    /// The agent failed; the string is the error surfaced to the caller.
    Failed(String),
    /// The loop exited because `cancel` was observed, not because of a real
    /// failure. Kept distinct from `Failed` so the executor never races a
    /// competing terminal status against the `Canceled` state
    /// [`AgentLoopExecutor::cancel`] already published.
    Canceled,
}

/// A tool the LLM may invoke.
#[derive(Clone)]
pub struct ToolSpec {
    /// Unique tool name, as referenced by the LLM's tool-call output.
    pub name: String,
    /// Natural-language description shown to the LLM.
    pub description: String,
    /// JSON Schema describing the tool's arguments.
    pub parameters_schema: Value,
    /// If `true`, the loop must gate this tool's execution on operator
    /// approval before running it. Approval plumbing itself is a caller
    /// concern — this flag just records the requirement.
    pub approval_required: bool,
    /// Optional requests-per-minute ceiling enforced by [`ToolRegistry`].
    pub rate_limit_per_minute: Option<u32>,
}

/// Context passed to a tool's `execute` call.
pub struct ToolContext {
    /// The task this tool invocation belongs to.
    pub task_id: String,
    /// The conversation context this task belongs to.
    pub context_id: String,
}

/// A tool the agent loop can dispatch to.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's static specification (name, schema, flags).
    fn spec(&self) -> &ToolSpec;

    /// Execute the tool with the given arguments.
    ///
    /// Returns `(result_text, is_error)`. A `result_text` beginning with
    /// [`INPUT_REQUIRED_SENTINEL`] pauses the loop (see module docs).
    async fn execute(&self, ctx: &ToolContext, args: Value) -> (String, bool);
}

/// A registry of tools available to the agent loop, with simple per-tool
/// rate limiting.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    call_timestamps: Mutex<HashMap<String, Vec<chrono::DateTime<chrono::Utc>>>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            call_timestamps: Mutex::new(HashMap::new()),
        }
    }

    /// Register a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.spec().name.clone(), tool);
    }

    /// List the specs of every registered tool, for advertising to the LLM.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|t| t.spec().clone()).collect()
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check and record a call against a tool's rate limit.
    ///
    /// Returns `true` if the call is admitted, `false` if the tool has
    /// exceeded its `rate_limit_per_minute`.
    async fn admit(&self, spec: &ToolSpec) -> bool {
        let Some(limit) = spec.rate_limit_per_minute else {
            return true;
        };
        let mut timestamps = self.call_timestamps.lock().await;
        let entry = timestamps.entry(spec.name.clone()).or_default();
        let cutoff = chrono::Utc::now() - chrono::Duration::minutes(1);
        entry.retain(|t| *t > cutoff);
        if entry.len() as u32 >= limit {
            false
        } else {
            entry.push(chrono::Utc::now());
            true
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A single tool call requested by the LLM.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Identifier correlating the call with its result.
    pub id: String,
    /// The tool's name.
    pub name: String,
    /// Arguments to pass to the tool.
    pub arguments: Value,
}

/// One LLM turn's output.
#[derive(Debug, Clone)]
pub enum LlmResponse {
    /// The model produced a final text reply.
    Text(String),
    /// The model requested one or more tool calls.
    ToolCalls(Vec<ToolCall>),
}

/// A single streamed fragment of an in-progress LLM turn.
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    /// An incremental chunk of assistant text.
    Delta(String),
    /// The turn finished with the given final response.
    Done(LlmResponse),
}

/// Capability boundary for the language model the agent loop drives.
///
/// This crate never binds to a concrete hosted-model SDK — implement this
/// trait against whichever provider a deployment needs.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion turn over the given history and available tools.
    async fn complete(&self, history: &[Message], tools: &[ToolSpec]) -> A2AResult<LlmResponse>;

    /// Streaming variant of [`complete`](Self::complete). The default
    /// implementation calls `complete` and emits a single `Done` event —
    /// override for real token-level streaming.
    async fn complete_stream(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
        sink: tokio::sync::mpsc::Sender<LlmStreamEvent>,
    ) -> A2AResult<LlmResponse> {
        let response = self.complete(history, tools).await?;
        let _ = sink.send(LlmStreamEvent::Done(response.clone())).await;
        Ok(response)
    }
}

/// Deterministic reference [`LlmClient`] used by tests and the demo binary.
///
/// Echoes the latest user text back as its answer unless the message asks to
/// invoke a registered tool by name (`"use tool <name> <json-args>"`), in
/// which case it emits a single matching tool call.
pub struct EchoLlmClient;

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn complete(&self, history: &[Message], tools: &[ToolSpec]) -> A2AResult<LlmResponse> {
        let last_user_text = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| {
                m.parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text { text, .. } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        if let Some(rest) = last_user_text.strip_prefix("use tool ") {
            let mut parts = rest.splitn(2, ' ');
            if let Some(name) = parts.next() {
                if tools.iter().any(|t| t.name == name) {
                    let args = parts
                        .next()
                        .and_then(|s| serde_json::from_str(s).ok())
                        .unwrap_or(Value::Null);
                    return Ok(LlmResponse::ToolCalls(vec![ToolCall {
                        id: Uuid::new_v4().to_string(),
                        name: name.to_string(),
                        arguments: args,
                    }]));
                }
            }
        }

        Ok(LlmResponse::Text(format!("echo: {last_user_text}")))
    }
}

/// Configuration bounding an [`AgentLoop`] run.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Maximum LLM-call rounds before the loop fails with
    /// `max_iterations_exceeded`.
    pub max_iterations: usize,
    /// Maximum number of history messages kept across iterations; older
    /// messages are dropped from the tail-truncated working copy (the
    /// task's persisted history is never mutated by this truncation).
    pub max_conversation_history: usize,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_conversation_history: 50,
        }
    }
}

/// Drives the iterative LLM-call / tool-dispatch loop described by the agent
/// lifecycle: call the model, execute any requested tools, fold results back
/// into history, repeat until a text-only reply, an input-required pause, or
/// the iteration budget runs out.
pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    /// Build a new agent loop over the given model and tool registry.
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, config: AgentLoopConfig) -> Self {
        Self { llm, tools, config }
    }

    fn truncated_history(&self, history: &[Message]) -> Vec<Message> {
        if history.len() > self.config.max_conversation_history {
            history[history.len() - self.config.max_conversation_history..].to_vec()
        } else {
            history.to_vec()
        }
    }

    /// Run the loop to completion (or input-required, or failure).
    ///
    /// `cancel` is observed before each LLM call and before each tool
    /// execution — honoring it aborts the loop promptly with `Failed`
    /// carrying a cancellation message, matching the cooperative
    /// cancellation model the rest of the server uses.
    pub async fn run(
        &self,
        task_id: &str,
        context_id: &str,
        history: &mut Vec<Message>,
        cancel: CancellationToken,
    ) -> AgentOutcome {
        let specs = self.tools.specs();

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return AgentOutcome::Canceled;
            }

            let working_history = self.truncated_history(history);
            let response = match self.llm.complete(&working_history, &specs).await {
                Ok(r) => r,
                Err(e) => return AgentOutcome::Failed(e.to_string()),
            };

            match response {
                LlmResponse::Text(text) => {
                    let message = Message {
                        message_id: Uuid::new_v4().to_string(),
                        role: Role::Agent,
                        kind: "message".to_string(),
                        parts: vec![Part::text(text)],
                        context_id: Some(context_id.to_string()),
                        task_id: Some(task_id.to_string()),
                        metadata: None,
                        extensions: None,
                        reference_task_ids: None,
                    };
                    history.push(message.clone());
                    return AgentOutcome::Completed(message);
                }
                LlmResponse::ToolCalls(calls) => {
                    let mut paused: Option<String> = None;

                    for call in calls {
                        if cancel.is_cancelled() {
                            return AgentOutcome::Canceled;
                        }

                        let (result_text, is_error) = match self.dispatch_tool(&call, task_id, context_id).await {
                            Ok(v) => v,
                            Err(e) => (e, true),
                        };

                        if let Some(prompt) = result_text.strip_prefix(INPUT_REQUIRED_SENTINEL) {
                            paused = Some(prompt.to_string());
                        }

                        let tool_message = Message {
                            message_id: Uuid::new_v4().to_string(),
                            role: Role::Tool,
                            kind: "message".to_string(),
                            parts: vec![Part::Data {
                                data: serde_json::json!({
                                    "tool_call_id": call.id,
                                    "tool_name": call.name,
                                    "result": result_text,
                                    "error": is_error,
                                }),
                                metadata: None,
                            }],
                            context_id: Some(context_id.to_string()),
                            task_id: Some(task_id.to_string()),
                            metadata: None,
                            extensions: None,
                            reference_task_ids: None,
                        };
                        history.push(tool_message);
                    }

                    if let Some(prompt) = paused {
                        return AgentOutcome::InputRequired(prompt);
                    }
                }
            }

            debug!(task_id, iteration, "agent loop iteration complete");
        }

        AgentOutcome::Failed("max_iterations_exceeded".to_string())
    }

    async fn dispatch_tool(
        &self,
        call: &ToolCall,
        task_id: &str,
        context_id: &str,
    ) -> Result<(String, bool), String> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(format!("unknown tool '{}'", call.name));
        };
        if !self.tools.admit(tool.spec()).await {
            warn!(tool = %call.name, "tool call rejected by rate limiter");
            return Err(format!("tool '{}' rate limit exceeded", call.name));
        }
        let ctx = ToolContext {
            task_id: task_id.to_string(),
            context_id: context_id.to_string(),
        };
        Ok(tool.execute(&ctx, call.arguments.clone()).await)
    }
}

/// An [`AgentExecutor`] that drives a task's conversation through an
/// [`AgentLoop`] and translates the resulting [`AgentOutcome`] into
/// [`TaskUpdater`] transitions.
pub struct AgentLoopExecutor {
    agent_loop: Arc<AgentLoop>,
    cancellations: Mutex<HashMap<String, CancellationToken>>,
}

impl AgentLoopExecutor {
    /// Wrap an [`AgentLoop`] as a server [`AgentExecutor`].
    pub fn new(agent_loop: Arc<AgentLoop>) -> Self {
        Self {
            agent_loop,
            cancellations: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AgentExecutor for AgentLoopExecutor {
    async fn execute(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        let updater = TaskUpdater::new(
            event_queue,
            context.task_id.clone(),
            context.context_id.clone(),
        );

        let token = CancellationToken::new();
        {
            let mut map = self.cancellations.lock().await;
            map.insert(context.task_id.clone(), token.clone());
        }

        updater.start_work(None).await?;

        let mut history = context
            .task
            .as_ref()
            .and_then(|t| t.history.clone())
            .unwrap_or_default();
        if let Some(ref message) = context.message {
            if history.last().map(|m| &m.message_id) != Some(&message.message_id) {
                history.push(message.clone());
            }
        }

        let outcome = self
            .agent_loop
            .run(&context.task_id, &context.context_id, &mut history, token)
            .await;

        self.cancellations.lock().await.remove(&context.task_id);

        match outcome {
            AgentOutcome::Completed(message) => updater.complete(Some(message)).await,
            AgentOutcome::InputRequired(prompt) => {
                let message = updater.new_agent_message(vec![Part::text(prompt)], None);
                updater.requires_input(Some(message), false).await
            }
            AgentOutcome::Failed(reason) => {
                let message = updater.new_agent_message(vec![Part::text(reason)], None);
                updater.failed(Some(message)).await
            }
            // `cancel()` already published the `Canceled` terminal status as
            // soon as the token was signaled; publishing another terminal
            // status here would race it. Nothing left to do.
            AgentOutcome::Canceled => Ok(()),
        }
    }

    async fn cancel(&self, context: RequestContext, event_queue: EventQueue) -> A2AResult<()> {
        if let Some(token) = self.cancellations.lock().await.get(&context.task_id) {
            token.cancel();
        } else {
            return Err(A2AError::task_not_cancelable(format!(
                "task {} has no running agent loop",
                context.task_id
            )));
        }
        let updater = TaskUpdater::new(event_queue, context.task_id, context.context_id);
        updater.cancel(None).await
    }
}
