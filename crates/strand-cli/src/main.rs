//! CLI entry point for Strand.
//!
//! Provides the `strand` command with two subcommands: `serve` starts the
//! HTTP server with the SSE chat endpoint, `ask` runs a one-shot loop
//! directly in the terminal.

mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing::info;

use strand_core::{LoopConfig, LoopEvent, Message, OllamaProvider, run_loop};
use strand_store::{ConversationStore, Database};
use strand_tools::BuiltinRegistry;
use strand_web::{WebConfig, WebServer};

use crate::cli::{Cli, Commands};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing).
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let loop_config = LoopConfig {
        max_iterations: cli.max_iterations,
        model: cli.model.clone(),
        system_prompt: load_system_prompt(cli.system_prompt_file.as_deref())?,
    };

    match cli.command {
        Commands::Serve { bind, port, db } => {
            cmd_serve(cli.ollama_url, loop_config, bind, port, db).await
        }
        Commands::Ask {
            prompt,
            show_thinking,
        } => cmd_ask(cli.ollama_url, loop_config, prompt, show_thinking).await,
    }
}

/// Initialize the tracing subscriber, honoring `RUST_LOG` when set.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Read the system prompt file, if one was given.
fn load_system_prompt(path: Option<&std::path::Path>) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read system prompt {}", path.display()))?;
            Ok(Some(prompt.trim().to_owned()))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(
    ollama_url: String,
    loop_config: LoopConfig,
    bind: String,
    port: u16,
    db_path: PathBuf,
) -> Result<()> {
    init_tracing("strand=info");

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let db = Database::open_and_migrate(db_path.clone())
        .await
        .context("failed to open database")?;
    info!(path = %db_path.display(), "store initialized");

    let conversations = ConversationStore::new(db);

    let workspace = std::env::current_dir().context("failed to get current directory")?;
    let registry = Arc::new(BuiltinRegistry::with_defaults(workspace));

    let provider = Arc::new(OllamaProvider::new(&ollama_url));
    info!(backend = %ollama_url, model = %loop_config.model, "provider ready");

    let server = WebServer::new(
        WebConfig {
            bind_addr: bind,
            port,
        },
        provider,
        registry,
        conversations,
        loop_config,
    );

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

// ---------------------------------------------------------------------------
// Subcommand: ask
// ---------------------------------------------------------------------------

async fn cmd_ask(
    ollama_url: String,
    loop_config: LoopConfig,
    prompt: String,
    show_thinking: bool,
) -> Result<()> {
    init_tracing("strand=warn");

    let workspace = std::env::current_dir().context("failed to get current directory")?;
    let registry = Arc::new(BuiltinRegistry::with_defaults(workspace));
    let provider = Arc::new(OllamaProvider::new(&ollama_url));

    let messages = vec![Message::user(prompt)];
    let mut events = pin!(run_loop(provider, registry, loop_config, &messages));

    let mut stdout = std::io::stdout();
    let mut failed = None;

    while let Some(event) = events.next().await {
        match event {
            LoopEvent::Thinking { content } => {
                if show_thinking {
                    eprint!("{content}");
                }
            }
            LoopEvent::TextDelta { content } => {
                print!("{content}");
                stdout.flush().ok();
            }
            LoopEvent::ToolCall { call } => {
                eprintln!("→ {} {}", call.name, call.arguments);
            }
            LoopEvent::ToolResult { result, .. } => {
                eprintln!("← {}", summarize(&result));
            }
            // Deltas were already printed as they streamed.
            LoopEvent::Text { .. } => {}
            LoopEvent::Error { message } => {
                failed = Some(message);
            }
            LoopEvent::Done => {
                println!();
            }
            LoopEvent::Conversation { .. } => {}
        }
    }

    match failed {
        Some(message) => Err(anyhow::anyhow!(message)),
        None => Ok(()),
    }
}

/// First line of a tool result, truncated for terminal display.
fn summarize(result: &str) -> String {
    const MAX: usize = 200;
    let first_line = result.lines().next().unwrap_or_default();
    if first_line.len() <= MAX {
        first_line.to_owned()
    } else {
        let mut end = MAX;
        while !first_line.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &first_line[..end])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
