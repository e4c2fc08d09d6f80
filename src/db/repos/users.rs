use rusqlite::{params, Row};

use crate::auth;
use crate::db::models::{CreateUserInput, User};
use crate::db::DbPool;
use crate::error::AppError;

// ============================================================================
// Row Mappers
// ============================================================================

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        profile_notes: row.get("profile_notes")?,
        created_at: row.get("created_at")?,
    })
}

fn is_email_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("users.email")
    )
}

// ============================================================================
// Credential Store
// ============================================================================

/// Register a new account. Persists only the salted hash of the password.
pub fn create(pool: &DbPool, input: CreateUserInput) -> Result<User, AppError> {
    auth::validate_registration(&input.email, &input.display_name, &input.password)?;

    let email = auth::normalize_email(&input.email);
    let password_hash = auth::hash_password(&input.password)?;
    let profile_notes = input
        .profile_notes
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (id, email, display_name, password_hash, profile_notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            email,
            input.display_name.trim(),
            password_hash,
            profile_notes,
            now,
        ],
    )
    .map_err(|e| {
        if is_email_unique_violation(&e) {
            AppError::DuplicateEmail
        } else {
            AppError::Database(e)
        }
    })?;

    tracing::info!(user_id = %id, "User registered");
    get_by_id(pool, &id)
}

/// Verify login credentials and return the account.
///
/// Unknown email and wrong password both fail with `InvalidCredentials`. A
/// throwaway hash runs on the unknown-email path so the two failures stay
/// timing-comparable.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> Result<User, AppError> {
    let email = auth::normalize_email(email);
    let conn = pool.get()?;

    let found: Option<(String, String)> = conn
        .query_row(
            "SELECT id, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(AppError::Database(other)),
        })?;

    let Some((user_id, stored_hash)) = found else {
        let _ = auth::hash_password(password);
        return Err(AppError::InvalidCredentials);
    };

    if !auth::verify_password(password, &stored_hash) {
        return Err(AppError::InvalidCredentials);
    }

    drop(conn);
    tracing::info!(user_id = %user_id, "User authenticated");
    get_by_id(pool, &user_id)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<User, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT id, email, display_name, profile_notes, created_at
         FROM users WHERE id = ?1",
        params![id],
        row_to_user,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("User {id}")),
        other => AppError::Database(other),
    })
}

// ============================================================================
// Profile Store
// ============================================================================

/// Fetch the user's free-text profile notes; empty string when unset.
pub fn get_profile(pool: &DbPool, user_id: &str) -> Result<String, AppError> {
    let conn = pool.get()?;
    let notes: Option<String> = conn
        .query_row(
            "SELECT profile_notes FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                AppError::NotFound(format!("User {user_id}"))
            }
            other => AppError::Database(other),
        })?;
    Ok(notes.unwrap_or_default())
}

/// Overwrite the user's profile notes. Blank text clears them.
pub fn set_profile(pool: &DbPool, user_id: &str, text: &str) -> Result<(), AppError> {
    let notes = Some(text.trim()).filter(|s| !s.is_empty());
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE users SET profile_notes = ?1 WHERE id = ?2",
        params![notes, user_id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("User {user_id}")));
    }
    tracing::debug!(user_id = %user_id, "Profile notes updated");
    Ok(())
}
