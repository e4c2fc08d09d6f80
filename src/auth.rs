use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;

use crate::error::AppError;

/// Minimum password length accepted at registration. Shells may enforce a
/// stricter policy on top.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password with PBKDF2-SHA256 and a fresh per-password salt.
/// The result is a self-describing PHC string (`$pbkdf2-sha256$...`).
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Uses the scheme's own verify routine (constant-time comparison); a
/// malformed stored hash counts as a failed verification rather than an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Pbkdf2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Normalize an email for storage and lookup: trimmed, lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic format/length checks on registration fields.
pub fn validate_registration(
    email: &str,
    display_name: &str,
    password: &str,
) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') || email.starts_with('@') || email.ends_with('@')
    {
        return Err(AppError::InvalidInput("A valid email is required".into()));
    }
    if display_name.trim().is_empty() {
        return Err(AppError::InvalidInput("Display name is required".into()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$"));
        assert!(verify_password("correct horse battery", &hash));
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("pw12345678").unwrap();
        let b = hash_password("pw12345678").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_stored_hash_fails_closed() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("a@x.com", "Ada", "pw123456").is_ok());
        assert!(validate_registration("not-an-email", "Ada", "pw123456").is_err());
        assert!(validate_registration("a@x.com", "  ", "pw123456").is_err());
        assert!(validate_registration("a@x.com", "Ada", "short").is_err());
    }
}
