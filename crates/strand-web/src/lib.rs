//! Web interface for Strand.
//!
//! Exposes the inference loop over HTTP:
//!
//! - `POST /api/chat` — streaming chat as server-sent events, one `data:`
//!   frame per loop event, closed after `done`.
//! - Conversation CRUD under `/api/conversations`.
//! - `/api/status` and `/api/tools` for discovery.
//!
//! Consumer cancellation propagates by drop: disconnect → SSE body dropped
//! → loop generator dropped → provider stream dropped → backend request
//! aborted.

pub mod api;
pub mod chat;
pub mod server;
pub mod sse;
pub mod state;

pub use server::WebServer;
pub use sse::{CancelHook, event_frames, sse_response};
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 7878,
        }
    }
}
