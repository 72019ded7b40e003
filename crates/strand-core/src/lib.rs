//! Core inference loop for Strand.
//!
//! Strand is a local-first autonomous agent runtime: a chat request drives a
//! conversation with a local model through repeated turns of reason → invoke
//! tools → observe → reason again, streaming every intermediate event to the
//! caller.  This crate is the pipeline that makes that work:
//!
//! ```text
//! consumer ◄── LoopEvent stream ──┐
//!                                 │
//!      ┌──────────┐        ┌──────┴──────┐        ┌──────────────┐
//!      │ Provider │───────►│  run_loop   │◄──────►│ ToolRegistry │
//!      │ (Ollama) │ events │ (orchestr.) │  exec  │ (capability) │
//!      └────┬─────┘        └─────────────┘        └──────────────┘
//!           │
//!   ┌───────┴────────┐   ┌────────────────┐
//!   │  FrameDecoder  │──►│ ThinkTagParser │
//!   │ (NDJSON bytes) │   │ (<think> tags) │
//!   └────────────────┘   └────────────────┘
//! ```
//!
//! Cancellation is cooperative and flows downstream by dropping streams:
//! consumer → loop → provider → backend connection.
//!
//! ## Modules
//!
//! - [`types`] — messages, tool calls, provider and loop events.
//! - [`tag`] — the `<think>` sentinel state machine.
//! - [`frame`] — newline-delimited frame decoding.
//! - [`provider`] — the `Provider` trait and the Ollama implementation.
//! - [`runtime`] — the loop orchestrator and the `ToolRegistry` seam.
//! - [`error`] — core error types.

pub mod error;
pub mod frame;
pub mod provider;
pub mod runtime;
pub mod tag;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use error::{AgentError, Result};
pub use frame::{ChatFrame, FrameDecoder, FrameMessage, RawFunction, RawToolCall};
pub use provider::{OllamaProvider, Provider, ProviderEventStream};
pub use runtime::{LoopEventStream, ToolRegistry, run_loop};
pub use tag::ThinkTagParser;
pub use types::{
    LoopConfig, LoopEvent, Message, ProviderEvent, Role, ToolCall, ToolDefinition,
};
