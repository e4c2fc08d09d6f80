use serde::Serialize;

/// App-wide error type. Every fallible function returns `Result<T, AppError>`.
/// Serializes cleanly so a presentation shell gets structured error messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("An account with that email already exists")]
    DuplicateEmail,

    // Single generic message for unknown email and wrong password alike,
    // so callers cannot enumerate accounts.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Model service unavailable: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

/// The presentation shell renders errors from `{ error: "...", kind: "..." }`.
/// `Database` and `Pool` both surface as the generic `storage` kind — callers
/// cannot act on the distinction and the message already carries the detail.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field(
            "kind",
            match self {
                AppError::Database(_) | AppError::Pool(_) => "storage",
                AppError::NotFound(_) => "not_found",
                AppError::InvalidInput(_) => "invalid_input",
                AppError::DuplicateEmail => "duplicate_email",
                AppError::InvalidCredentials => "invalid_credentials",
                AppError::Upstream(_) => "upstream",
                AppError::Io(_) => "io",
                AppError::Serde(_) => "serde",
                AppError::Internal(_) => "internal",
            },
        )?;
        s.end()
    }
}
