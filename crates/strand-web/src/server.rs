//! Web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;

use strand_core::{LoopConfig, Provider, ToolRegistry};
use strand_store::ConversationStore;

use crate::WebConfig;
use crate::api;
use crate::chat;
use crate::state::AppState;

/// The Strand web server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server.
    ///
    /// # Arguments
    ///
    /// * `config` - Bind address and port configuration.
    /// * `provider` - The model provider shared across all requests.
    /// * `registry` - The tool registry exposed to the loop.
    /// * `conversations` - Conversation persistence.
    /// * `loop_defaults` - Default loop configuration per request.
    pub fn new(
        config: WebConfig,
        provider: Arc<dyn Provider>,
        registry: Arc<dyn ToolRegistry>,
        conversations: ConversationStore,
        loop_defaults: LoopConfig,
    ) -> Self {
        let state = Arc::new(AppState {
            provider,
            registry,
            conversations,
            loop_defaults,
        });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    ///
    /// Public so tests can serve the exact production router on an
    /// ephemeral port.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().expect("static origin"))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            // System.
            .route("/api/status", get(api::status))
            .route("/api/tools", get(api::tools))
            // Streaming chat.
            .route("/api/chat", post(chat::chat))
            // Conversation management.
            .route("/api/conversations", get(api::list_conversations))
            .route("/api/conversations", post(api::create_conversation))
            .route("/api/conversations/{id}", get(api::get_conversation))
            .route("/api/conversations/{id}", delete(api::delete_conversation))
            .route(
                "/api/conversations/{id}/messages",
                get(api::get_conversation_messages),
            )
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting web server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
