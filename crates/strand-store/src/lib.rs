//! # strand-store
//!
//! SQLite persistence for Strand: conversations and their messages.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  ConversationStore (CRUD + messages)     │
//! ├──────────────────────────────────────────┤
//! │  Database (rusqlite WAL, worker thread)  │
//! │  Migrations (versioned, idempotent)      │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The boundary invariant the web layer relies on: for every assistant
//! message whose `tool_calls` column is non-empty, each call id appears
//! exactly once as the `tool_call_id` of a later tool-role message in the
//! same conversation, in the same order.

pub mod conversation;
pub mod db;
pub mod error;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use conversation::{Conversation, ConversationStore, StoredMessage};
pub use db::Database;
pub use error::{StoreError, StoreResult};
