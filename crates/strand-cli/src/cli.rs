//! CLI argument definitions for Strand.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Strand -- a local-first autonomous agent runtime.
#[derive(Parser)]
#[command(
    name = "strand",
    version,
    about = "Strand -- local-first agent runtime over Ollama",
    long_about = "Drives a conversation with a local model through repeated turns of \
                  reason, tool invocation, and observation, streaming every \
                  intermediate event."
)]
pub struct Cli {
    /// Base URL of the Ollama backend.
    #[arg(
        long,
        global = true,
        env = "STRAND_OLLAMA_URL",
        default_value = "http://127.0.0.1:11434"
    )]
    pub ollama_url: String,

    /// Model identifier sent to the backend.
    #[arg(long, global = true, env = "STRAND_MODEL", default_value = "qwen3")]
    pub model: String,

    /// Maximum reasoning turns per request.
    #[arg(long, global = true, default_value_t = 10)]
    pub max_iterations: u32,

    /// File containing the system prompt (optional).
    #[arg(long, global = true, env = "STRAND_SYSTEM_PROMPT_FILE")]
    pub system_prompt_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server with the SSE chat endpoint.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 7878)]
        port: u16,

        /// Database file path.
        #[arg(long, env = "STRAND_DB", default_value = "data/strand.db")]
        db: PathBuf,
    },

    /// Ask a one-shot question without the HTTP layer.
    Ask {
        /// The prompt to send.
        prompt: String,

        /// Also print hidden reasoning to stderr.
        #[arg(long)]
        show_thinking: bool,
    },
}
