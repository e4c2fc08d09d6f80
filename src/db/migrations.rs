use rusqlite::Connection;

use crate::error::AppError;

/// Run the consolidated schema migration. Idempotent — safe to re-run on
/// every startup.
pub fn run(conn: &Connection) -> Result<(), AppError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Users
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    display_name  TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    profile_notes TEXT,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

-- ============================================================================
-- Conversations
-- ============================================================================

CREATE TABLE IF NOT EXISTS conversations (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title       TEXT NOT NULL DEFAULT 'Stillpoint session',
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);
-- At most one active conversation per user, enforced by the schema itself.
-- A lost race on activation fails loudly instead of leaving two actives.
CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_one_active
    ON conversations(user_id) WHERE is_active = 1;

-- ============================================================================
-- Messages
-- ============================================================================

CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role            TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'system')),
    content         TEXT NOT NULL,
    ordinal         INTEGER NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE(conversation_id, ordinal)
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, ordinal);

"#;
