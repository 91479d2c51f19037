//! Password hashing and the admin password policy

use std::fmt;

use super::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Work factor for new hashes. Stored hashes carry their own cost.
pub const BCRYPT_COST: u32 = 10;

/// One rule of the password policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRequirement {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Special,
}

impl fmt::Display for PasswordRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinLength => write!(f, "at least {} characters", MIN_PASSWORD_LENGTH),
            Self::Uppercase => f.write_str("an uppercase letter"),
            Self::Lowercase => f.write_str("a lowercase letter"),
            Self::Digit => f.write_str("a number"),
            Self::Special => f.write_str("a special character"),
        }
    }
}

/// Returns every requirement the password misses; empty means acceptable
pub fn validate_password_strength(password: &str) -> Vec<PasswordRequirement> {
    let mut unmet = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        unmet.push(PasswordRequirement::MinLength);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        unmet.push(PasswordRequirement::Uppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        unmet.push(PasswordRequirement::Lowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        unmet.push(PasswordRequirement::Digit);
    }
    if !password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        unmet.push(PasswordRequirement::Special);
    }

    unmet
}

/// Hash a password with bcrypt. The `$2b$` string carries salt and cost.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    bcrypt::hash(password, BCRYPT_COST)
        .map_err(|e| AuthError::Hash(format!("Failed to hash password: {e}")))
}

/// Accepts any `$2a$`, `$2b$`, `$2x$` or `$2y$` hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    bcrypt::verify(password, hash)
        .map_err(|e| AuthError::Hash(format!("Invalid password hash format: {e}")))
}
