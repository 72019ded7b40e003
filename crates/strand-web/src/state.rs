//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  It holds the provider, the tool registry, and the
//! conversation store.

use std::sync::Arc;

use strand_core::{LoopConfig, Provider, ToolRegistry};
use strand_store::ConversationStore;

/// Shared state accessible from every Axum handler.
pub struct AppState {
    /// The model provider used for all chat turns.
    pub provider: Arc<dyn Provider>,

    /// The tool registry exposed to the loop.
    pub registry: Arc<dyn ToolRegistry>,

    /// Conversation persistence.
    pub conversations: ConversationStore,

    /// Per-request loop defaults (`model` may be overridden per request).
    pub loop_defaults: LoopConfig,
}
