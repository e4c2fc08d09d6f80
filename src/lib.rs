//! Stillpoint session & persistence core.
//!
//! Library consumed by a presentation shell: account management with hashed
//! credentials, per-user conversation/message storage in SQLite, prompt
//! context assembly, and a session controller that orchestrates the external
//! chat-model call. The shell renders; the hosted model replies; everything
//! in between lives here.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod session;

pub use config::ModelConfig;
pub use context::{build_context, ContextMessage, PERSONA_INSTRUCTIONS};
pub use db::models::{ChatRole, Conversation, CreateUserInput, Message, User};
pub use db::{init_db, DbPool};
pub use engine::{ModelProvider, OpenAiProvider};
pub use error::AppError;
pub use session::{Session, SessionController};
