//! End-to-end loop tests against scripted providers and registries.
//!
//! These exercise the orchestrator's observable event stream: ordering,
//! terminal markers, error conversion, and context accumulation — without a
//! live backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;

use strand_core::{
    AgentError, LoopConfig, LoopEvent, Message, Provider, ProviderEvent, ProviderEventStream,
    Result, Role, ToolCall, ToolDefinition, ToolRegistry, run_loop,
};

// ═══════════════════════════════════════════════════════════════════════
//  Scripted collaborators
// ═══════════════════════════════════════════════════════════════════════

/// One scripted model turn.
enum Turn {
    /// The turn streams these items.
    Events(Vec<Result<ProviderEvent>>),
    /// Opening the turn fails outright.
    Fail(AgentError),
}

/// Provider that replays scripted turns and records every context it was
/// given.
struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    seen_contexts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            seen_contexts: Mutex::new(Vec::new()),
        })
    }

    fn contexts(&self) -> Vec<Vec<Message>> {
        self.seen_contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn open_turn(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _model: &str,
    ) -> Result<ProviderEventStream> {
        self.seen_contexts.lock().unwrap().push(messages.to_vec());

        match self.turns.lock().unwrap().pop_front() {
            Some(Turn::Fail(e)) => Err(e),
            Some(Turn::Events(events)) => Ok(Box::pin(futures::stream::iter(events))),
            None => Ok(Box::pin(futures::stream::iter(Vec::new()))),
        }
    }
}

/// Registry with one tool that always answers `response`, or errors when
/// `response` is `None`.
struct OneToolRegistry {
    name: String,
    response: Option<String>,
}

impl OneToolRegistry {
    fn answering(name: &str, response: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            response: Some(response.into()),
        })
    }

    fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            response: None,
        })
    }
}

#[async_trait]
impl ToolRegistry for OneToolRegistry {
    fn list(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: self.name.clone(),
            description: "scripted".into(),
            parameters: json!({"type": "object"}),
        }]
    }

    async fn execute(&self, name: &str, _arguments: &str) -> Result<String> {
        match &self.response {
            Some(response) => Ok(response.clone()),
            None => Err(AgentError::UnknownTool {
                tool_name: name.to_owned(),
            }),
        }
    }
}

fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

fn text_delta(content: &str) -> Result<ProviderEvent> {
    Ok(ProviderEvent::TextDelta {
        content: content.into(),
    })
}

fn config(max_iterations: u32) -> LoopConfig {
    LoopConfig {
        max_iterations,
        model: "qwen3".into(),
        system_prompt: None,
    }
}

async fn collect(
    provider: Arc<ScriptedProvider>,
    registry: Arc<dyn ToolRegistry>,
    config: LoopConfig,
    messages: &[Message],
) -> Vec<LoopEvent> {
    run_loop(provider, registry, config, messages).collect().await
}

// ═══════════════════════════════════════════════════════════════════════
//  Scenarios
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn plain_text_reply() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![
        text_delta("Hel"),
        text_delta("lo"),
    ])]);
    let registry = OneToolRegistry::answering("run_command", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("Hi")]).await;

    assert_eq!(
        events,
        vec![
            LoopEvent::TextDelta { content: "Hel".into() },
            LoopEvent::TextDelta { content: "lo".into() },
            LoopEvent::Text { content: "Hello".into() },
            LoopEvent::Done,
        ]
    );
}

#[tokio::test]
async fn single_tool_call_then_reply() {
    let bash_call = call("call_x", "bash", r#"{"cmd":"ls"}"#);
    let provider = ScriptedProvider::new(vec![
        Turn::Events(vec![Ok(ProviderEvent::ToolCalls {
            calls: vec![bash_call.clone()],
        })]),
        Turn::Events(vec![text_delta("done")]),
    ]);
    let registry = OneToolRegistry::answering("bash", "file1");

    let events = collect(
        provider.clone(),
        registry,
        config(10),
        &[Message::user("ls")],
    )
    .await;

    assert_eq!(
        events,
        vec![
            LoopEvent::ToolCall { call: bash_call.clone() },
            LoopEvent::ToolResult {
                call_id: "call_x".into(),
                result: "file1".into(),
            },
            LoopEvent::TextDelta { content: "done".into() },
            LoopEvent::Text { content: "done".into() },
            LoopEvent::Done,
        ]
    );

    // The second turn saw the accumulated context: user, assistant
    // tool-call message (no content), tool result.
    let contexts = provider.contexts();
    assert_eq!(contexts.len(), 2);
    let second = &contexts[1];
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].role, Role::Assistant);
    assert!(second[1].content.is_none());
    assert_eq!(second[1].tool_calls, vec![bash_call]);
    assert_eq!(second[2].role, Role::Tool);
    assert_eq!(second[2].tool_call_id.as_deref(), Some("call_x"));
    assert_eq!(second[2].content_text(), "file1");
}

#[tokio::test]
async fn reasoning_then_reply() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![
        Ok(ProviderEvent::Thinking { content: "plan".into() }),
        text_delta("answer"),
    ])]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("Hi")]).await;

    assert_eq!(
        events,
        vec![
            LoopEvent::Thinking { content: "plan".into() },
            LoopEvent::TextDelta { content: "answer".into() },
            LoopEvent::Text { content: "answer".into() },
            LoopEvent::Done,
        ]
    );
}

#[tokio::test]
async fn tool_error_is_fed_back_not_fatal() {
    let provider = ScriptedProvider::new(vec![
        Turn::Events(vec![Ok(ProviderEvent::ToolCalls {
            calls: vec![call("call_1", "missing_tool", "{}")],
        })]),
        Turn::Events(vec![text_delta("recovered")]),
    ]);
    let registry = OneToolRegistry::failing("missing_tool");

    let events = collect(
        provider.clone(),
        registry,
        config(10),
        &[Message::user("go")],
    )
    .await;

    assert_eq!(events.len(), 5);
    assert_eq!(
        events[0],
        LoopEvent::ToolCall {
            call: call("call_1", "missing_tool", "{}")
        }
    );
    match &events[1] {
        LoopEvent::ToolResult { call_id, result } => {
            assert_eq!(call_id, "call_1");
            assert!(result.starts_with("Error: "), "got {result:?}");
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(events[2], LoopEvent::TextDelta { content: "recovered".into() });
    assert_eq!(events[3], LoopEvent::Text { content: "recovered".into() });
    assert_eq!(events[4], LoopEvent::Done);

    // The error string went into the second turn's context as a normal
    // tool result.
    let contexts = provider.contexts();
    assert!(contexts[1][2].content_text().starts_with("Error: "));
}

#[tokio::test]
async fn backend_failure_surfaces_once_then_done() {
    let provider = ScriptedProvider::new(vec![Turn::Fail(AgentError::Backend {
        status: 500,
        body: "Internal Server Error".into(),
    })]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("Hi")]).await;

    assert_eq!(
        events,
        vec![
            LoopEvent::Error {
                message: "Ollama request failed: 500 - Internal Server Error".into(),
            },
            LoopEvent::Done,
        ]
    );
}

#[tokio::test]
async fn iteration_cap_after_two_tool_rounds() {
    let turn = |id: &str| {
        Turn::Events(vec![Ok(ProviderEvent::ToolCalls {
            calls: vec![call(id, "bash", "{}")],
        })])
    };
    let provider = ScriptedProvider::new(vec![turn("call_1"), turn("call_2")]);
    let registry = OneToolRegistry::answering("bash", "ok");

    let events = collect(provider, registry, config(2), &[Message::user("go")]).await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            LoopEvent::ToolCall { .. } => "tool_call",
            LoopEvent::ToolResult { .. } => "tool_result",
            LoopEvent::Error { .. } => "error",
            LoopEvent::Done => "done",
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["tool_call", "tool_result", "tool_call", "tool_result", "error", "done"]
    );
    assert_eq!(
        events[4],
        LoopEvent::Error { message: "Max iterations reached".into() }
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Boundaries and invariants
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn zero_max_iterations_never_invokes_provider() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![text_delta("nope")])]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(
        provider.clone(),
        registry,
        config(0),
        &[Message::user("Hi")],
    )
    .await;

    assert_eq!(
        events,
        vec![
            LoopEvent::Error { message: "Invalid maxIterations".into() },
            LoopEvent::Done,
        ]
    );
    assert!(provider.contexts().is_empty());
}

#[tokio::test]
async fn single_iteration_with_tool_batch_hits_the_cap() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![Ok(
        ProviderEvent::ToolCalls {
            calls: vec![call("call_1", "bash", "{}")],
        },
    )])]);
    let registry = OneToolRegistry::answering("bash", "ok");

    let events = collect(provider, registry, config(1), &[Message::user("go")]).await;

    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], LoopEvent::ToolCall { .. }));
    assert!(matches!(events[1], LoopEvent::ToolResult { .. }));
    assert_eq!(
        events[2],
        LoopEvent::Error { message: "Max iterations reached".into() }
    );
    assert_eq!(events[3], LoopEvent::Done);
}

#[tokio::test]
async fn explicit_empty_tool_batch_is_a_protocol_error() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![Ok(
        ProviderEvent::ToolCalls { calls: Vec::new() },
    )])]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("go")]).await;

    assert_eq!(
        events,
        vec![
            LoopEvent::Error { message: "Provider returned empty tool_calls".into() },
            LoopEvent::Done,
        ]
    );
}

#[tokio::test]
async fn mid_stream_transport_error_keeps_earlier_events() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![
        text_delta("partial"),
        Err(AgentError::Transport { reason: "connection reset".into() }),
    ])]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("Hi")]).await;

    assert_eq!(events[0], LoopEvent::TextDelta { content: "partial".into() });
    assert_eq!(
        events[1],
        LoopEvent::Error { message: "stream transport error: connection reset".into() }
    );
    assert_eq!(events[2], LoopEvent::Done);
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn caller_messages_are_never_mutated() {
    let provider = ScriptedProvider::new(vec![
        Turn::Events(vec![Ok(ProviderEvent::ToolCalls {
            calls: vec![call("call_1", "bash", "{}")],
        })]),
        Turn::Events(vec![text_delta("over")]),
    ]);
    let registry = OneToolRegistry::answering("bash", "ok");

    let messages = vec![Message::system("be terse"), Message::user("go")];
    let before = messages.clone();

    let _ = collect(provider, registry, config(10), &messages).await;

    assert_eq!(messages, before);
}

#[tokio::test]
async fn system_prompt_is_prepended_to_the_context() {
    let provider = ScriptedProvider::new(vec![Turn::Events(vec![text_delta("ok")])]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let config = LoopConfig {
        max_iterations: 3,
        model: "qwen3".into(),
        system_prompt: Some("be terse".into()),
    };
    let _ = collect(
        provider.clone(),
        registry,
        config,
        &[Message::user("Hi")],
    )
    .await;

    let contexts = provider.contexts();
    assert_eq!(contexts[0][0].role, Role::System);
    assert_eq!(contexts[0][0].content_text(), "be terse");
    assert_eq!(contexts[0][1].role, Role::User);
}

#[tokio::test]
async fn every_tool_result_follows_its_tool_call() {
    let provider = ScriptedProvider::new(vec![
        Turn::Events(vec![Ok(ProviderEvent::ToolCalls {
            calls: vec![
                call("call_a", "bash", "{}"),
                call("call_b", "bash", "{}"),
            ],
        })]),
        Turn::Events(vec![text_delta("over")]),
    ]);
    let registry = OneToolRegistry::answering("bash", "ok");

    let events = collect(provider, registry, config(10), &[Message::user("go")]).await;

    let mut open: Vec<String> = Vec::new();
    for event in &events {
        match event {
            LoopEvent::ToolCall { call } => open.push(call.id.clone()),
            LoopEvent::ToolResult { call_id, .. } => {
                // Strictly sequential: the result closes the most recent call.
                assert_eq!(open.pop().as_deref(), Some(call_id.as_str()));
            }
            _ => {}
        }
    }
    assert!(open.is_empty());
    assert_eq!(events.last(), Some(&LoopEvent::Done));
}

#[tokio::test]
async fn done_is_always_last_and_error_at_most_once() {
    let scripts: Vec<Vec<Turn>> = vec![
        vec![Turn::Events(vec![text_delta("fine")])],
        vec![Turn::Fail(AgentError::Backend { status: 502, body: "bad gateway".into() })],
        vec![Turn::Events(vec![Ok(ProviderEvent::ToolCalls { calls: Vec::new() })])],
        vec![],
    ];

    for turns in scripts {
        let provider = ScriptedProvider::new(turns);
        let registry = OneToolRegistry::answering("bash", "ok");
        let events = collect(provider, registry, config(2), &[Message::user("x")]).await;

        assert_eq!(events.last(), Some(&LoopEvent::Done));
        let errors = events
            .iter()
            .filter(|e| matches!(e, LoopEvent::Error { .. }))
            .count();
        assert!(errors <= 1, "got {errors} errors in {events:?}");
        let dones = events
            .iter()
            .filter(|e| matches!(e, LoopEvent::Done))
            .count();
        assert_eq!(dones, 1);
    }
}

#[tokio::test]
async fn empty_provider_stream_yields_bare_done() {
    // A turn that ends without any event and without tool calls.
    let provider = ScriptedProvider::new(vec![Turn::Events(Vec::new())]);
    let registry = OneToolRegistry::answering("bash", "unused");

    let events = collect(provider, registry, config(10), &[Message::user("Hi")]).await;
    assert_eq!(events, vec![LoopEvent::Done]);
}
