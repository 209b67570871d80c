//! Delete-password hashing

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use tuku_core::AppError;

pub const MIN_DELETE_PASSWORD_LEN: usize = 6;

/// Check a caller-supplied delete password before anything is stored.
pub fn check_delete_password(password: Option<&str>) -> Result<&str, AppError> {
    match password {
        None | Some("") => Err(AppError::InvalidInput(
            "A delete password is required".to_string(),
        )),
        Some(p) if p.chars().count() < MIN_DELETE_PASSWORD_LEN => {
            Err(AppError::InvalidInput(format!(
                "The delete password must be at least {} characters",
                MIN_DELETE_PASSWORD_LEN
            )))
        }
        Some(p) => Ok(p),
    }
}

/// Salted argon2 hash in PHC string format
pub fn hash_delete_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash delete password: {}", e)))
}

pub fn verify_delete_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_delete_password("secret123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_delete_password("secret123", &hash).unwrap());
        assert!(!verify_delete_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_delete_password("secret123").unwrap();
        let b = hash_delete_password("secret123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_rules() {
        assert!(check_delete_password(None).is_err());
        assert!(check_delete_password(Some("")).is_err());
        assert!(check_delete_password(Some("12345")).is_err());
        assert_eq!(check_delete_password(Some("123456")).unwrap(), "123456");
    }

    #[test]
    fn test_garbage_hash_is_internal_error() {
        assert!(matches!(
            verify_delete_password("secret123", "not-a-hash"),
            Err(AppError::Internal(_))
        ));
    }
}
