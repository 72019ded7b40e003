//! Loop orchestration.
//!
//! [`run_loop`] drives the reason → act cycle: it streams one model turn,
//! forwards its events to the caller, executes any requested tools through
//! the registry, folds the results back into the conversation context, and
//! repeats until the model produces a final answer or the iteration bound is
//! hit.
//!
//! The returned stream is lazy.  Dropping it mid-flight drops the current
//! provider stream, which aborts the backend request — cancellation flows
//! strictly downstream through suspension points, never out-of-band.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::{AgentError, Result};
use crate::provider::Provider;
use crate::types::{LoopConfig, LoopEvent, Message, ProviderEvent, ToolCall, ToolDefinition};

/// The lazy event sequence produced by [`run_loop`].
pub type LoopEventStream = Pin<Box<dyn Stream<Item = LoopEvent> + Send>>;

// ---------------------------------------------------------------------------
// Tool registry capability
// ---------------------------------------------------------------------------

/// A catalogue of named tools the model may invoke.
///
/// Implementations must be safe to share across concurrent loop
/// invocations; the loop itself never mutates registry state.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// The tool definitions advertised to the model.
    fn list(&self) -> Vec<ToolDefinition>;

    /// Execute a named tool with a JSON-object argument payload.
    ///
    /// # Errors
    ///
    /// Any error is converted by the loop into an `Error: <message>` result
    /// string and fed back to the model — it never aborts the loop.
    async fn execute(&self, name: &str, arguments: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// The loop
// ---------------------------------------------------------------------------

/// Run the inference loop over the given conversation.
///
/// Guarantees, on every path:
/// - the final event is [`LoopEvent::Done`];
/// - at most one [`LoopEvent::Error`] precedes it;
/// - `messages` is only read, never mutated;
/// - side effects are limited to tool invocations via `registry`.
pub fn run_loop(
    provider: Arc<dyn Provider>,
    registry: Arc<dyn ToolRegistry>,
    config: LoopConfig,
    messages: &[Message],
) -> LoopEventStream {
    let messages = messages.to_vec();

    Box::pin(stream! {
        if config.max_iterations == 0 {
            let err = AgentError::Validation {
                reason: "Invalid maxIterations".into(),
            };
            yield LoopEvent::Error { message: err.to_string() };
            yield LoopEvent::Done;
            return;
        }

        let mut context: Vec<Message> = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = &config.system_prompt {
            context.push(Message::system(prompt.clone()));
        }
        context.extend(messages);

        let tools = registry.list();

        tracing::debug!(
            max_iterations = config.max_iterations,
            model = %config.model,
            tool_count = tools.len(),
            "starting inference loop"
        );

        for iteration in 0..config.max_iterations {
            let mut accumulated = String::new();
            let mut pending_calls: Option<Vec<ToolCall>> = None;

            let mut turn = match provider.open_turn(&context, &tools, &config.model).await {
                Ok(stream) => stream,
                Err(e) => {
                    yield LoopEvent::Error { message: e.to_string() };
                    yield LoopEvent::Done;
                    return;
                }
            };

            let mut turn_error = None;
            while let Some(item) = turn.next().await {
                match item {
                    Ok(ProviderEvent::Thinking { content }) => {
                        yield LoopEvent::Thinking { content };
                    }
                    Ok(ProviderEvent::TextDelta { content }) => {
                        accumulated.push_str(&content);
                        yield LoopEvent::TextDelta { content };
                    }
                    Ok(ProviderEvent::ToolCalls { calls }) => {
                        pending_calls = Some(calls);
                        break;
                    }
                    Err(e) => {
                        turn_error = Some(e);
                        break;
                    }
                }
            }
            // Release the backend connection before running tools.
            drop(turn);

            if let Some(e) = turn_error {
                yield LoopEvent::Error { message: e.to_string() };
                yield LoopEvent::Done;
                return;
            }

            let Some(calls) = pending_calls else {
                // Final turn: the model answered in text.
                tracing::debug!(iteration, "loop finished with text response");
                if !accumulated.is_empty() {
                    yield LoopEvent::Text { content: accumulated };
                }
                yield LoopEvent::Done;
                return;
            };

            if calls.is_empty() {
                let err = AgentError::Protocol {
                    reason: "Provider returned empty tool_calls".into(),
                };
                yield LoopEvent::Error { message: err.to_string() };
                yield LoopEvent::Done;
                return;
            }

            tracing::debug!(
                iteration,
                tool_count = calls.len(),
                tools = ?calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "model requested tool calls"
            );

            context.push(Message::assistant_tool_calls(calls.clone()));

            // Strictly sequential dispatch keeps the event order and the
            // context accumulation deterministic.
            for call in calls {
                yield LoopEvent::ToolCall { call: call.clone() };

                let result = match registry.execute(&call.name, &call.arguments).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                        format!("Error: {e}")
                    }
                };

                yield LoopEvent::ToolResult {
                    call_id: call.id.clone(),
                    result: result.clone(),
                };
                context.push(Message::tool_result(call.id, result));
            }
        }

        let err = AgentError::IterationLimit {
            max_iterations: config.max_iterations,
        };
        yield LoopEvent::Error { message: err.to_string() };
        yield LoopEvent::Done;
    })
}
