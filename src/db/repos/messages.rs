use rusqlite::{params, Row, TransactionBehavior};

use crate::db::models::{ChatRole, Message};
use crate::db::DbPool;
use crate::error::AppError;

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get("role")?;
    let role = ChatRole::from_db(&role_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown message role '{role_str}'").into(),
        )
    })?;

    Ok(Message {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        role,
        content: row.get("content")?,
        ordinal: row.get("ordinal")?,
        created_at: row.get("created_at")?,
    })
}

fn ensure_conversation_exists(
    conn: &rusqlite::Connection,
    conversation_id: &str,
) -> Result<(), AppError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
        params![conversation_id],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(AppError::NotFound(format!("Conversation {conversation_id}")));
    }
    Ok(())
}

// ============================================================================
// Conversation Store — messages
// ============================================================================

/// Append a message at the next ordinal position.
///
/// The ordinal is read and claimed inside an immediate transaction so two
/// concurrent submissions cannot interleave into the same position;
/// `UNIQUE(conversation_id, ordinal)` backstops the invariant. Messages are
/// immutable once stored.
pub fn append(
    pool: &DbPool,
    conversation_id: &str,
    role: ChatRole,
    content: &str,
) -> Result<Message, AppError> {
    let mut conn = pool.get()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(AppError::Database)?;

    ensure_conversation_exists(&tx, conversation_id)?;

    let ordinal: i64 = tx.query_row(
        "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM messages WHERE conversation_id = ?1",
        params![conversation_id],
        |row| row.get(0),
    )?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO messages (id, conversation_id, role, content, ordinal, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, conversation_id, role.as_str(), content, ordinal, now],
    )?;
    tx.execute(
        "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
        params![now, conversation_id],
    )?;

    tx.commit().map_err(AppError::Database)?;

    tracing::debug!(
        conversation_id = %conversation_id,
        role = role.as_str(),
        ordinal,
        "Message appended"
    );

    Ok(Message {
        id,
        conversation_id: conversation_id.into(),
        role,
        content: content.into(),
        ordinal,
        created_at: now,
    })
}

/// Full history of a conversation in insertion order.
pub fn list(pool: &DbPool, conversation_id: &str) -> Result<Vec<Message>, AppError> {
    let conn = pool.get()?;
    ensure_conversation_exists(&conn, conversation_id)?;

    let mut stmt = conn.prepare(
        "SELECT * FROM messages
         WHERE conversation_id = ?1
         ORDER BY ordinal ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], row_to_message)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}
