use rusqlite::{params, Row, TransactionBehavior};

use crate::db::models::Conversation;
use crate::db::DbPool;
use crate::error::AppError;

const DEFAULT_TITLE: &str = "Stillpoint session";

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_conversation(row: &Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        is_active: row.get::<_, i32>("is_active")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_user_exists(conn: &rusqlite::Connection, user_id: &str) -> Result<(), AppError> {
    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
    if !exists {
        return Err(AppError::NotFound(format!("User {user_id}")));
    }
    Ok(())
}

// ============================================================================
// Conversation Store
// ============================================================================

/// Return the user's active conversation, creating one if none exists.
///
/// Runs under an immediate transaction so two concurrent callers (e.g. two
/// browser tabs) cannot each create an active conversation; the partial
/// unique index on `is_active = 1` backstops the invariant.
pub fn get_active(pool: &DbPool, user_id: &str) -> Result<Conversation, AppError> {
    let mut conn = pool.get()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(AppError::Database)?;

    ensure_user_exists(&tx, user_id)?;

    let existing = tx
        .query_row(
            "SELECT * FROM conversations
             WHERE user_id = ?1 AND is_active = 1
             ORDER BY created_at DESC
             LIMIT 1",
            params![user_id],
            row_to_conversation,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AppError::Database(other)),
        })?;

    if let Some(conv) = existing {
        tx.commit().map_err(AppError::Database)?;
        return Ok(conv);
    }

    let conv = insert_active(&tx, user_id)?;
    tx.commit().map_err(AppError::Database)?;

    tracing::info!(user_id = %user_id, conversation_id = %conv.id, "Active conversation created");
    Ok(conv)
}

/// Deactivate the user's current conversation (if any) and start a fresh one.
/// Prior conversations and their messages remain readable.
pub fn start_new(pool: &DbPool, user_id: &str) -> Result<Conversation, AppError> {
    let mut conn = pool.get()?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(AppError::Database)?;

    ensure_user_exists(&tx, user_id)?;

    let now = chrono::Utc::now().to_rfc3339();
    tx.execute(
        "UPDATE conversations SET is_active = 0, updated_at = ?1
         WHERE user_id = ?2 AND is_active = 1",
        params![now, user_id],
    )?;

    let conv = insert_active(&tx, user_id)?;
    tx.commit().map_err(AppError::Database)?;

    tracing::info!(user_id = %user_id, conversation_id = %conv.id, "New session started");
    Ok(conv)
}

fn insert_active(conn: &rusqlite::Connection, user_id: &str) -> Result<Conversation, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO conversations (id, user_id, title, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        params![id, user_id, DEFAULT_TITLE, now],
    )?;

    Ok(Conversation {
        id,
        user_id: user_id.into(),
        title: DEFAULT_TITLE.into(),
        is_active: true,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Conversation, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM conversations WHERE id = ?1",
        params![id],
        row_to_conversation,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            AppError::NotFound(format!("Conversation {id}"))
        }
        other => AppError::Database(other),
    })
}

/// All of the user's conversations, newest first. Inactive sessions are
/// retained indefinitely and stay listed here.
pub fn list_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<Conversation>, AppError> {
    let conn = pool.get()?;
    ensure_user_exists(&conn, user_id)?;

    let mut stmt = conn.prepare(
        "SELECT * FROM conversations
         WHERE user_id = ?1
         ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_conversation)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)
}
