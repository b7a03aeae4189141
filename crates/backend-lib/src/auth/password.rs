// ============================
// backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
use scrypt::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Params, Scrypt,
};
use serde::Deserialize;
use zeroize::Zeroize;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters that count as "special" for the strength check
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Default scrypt cost (log2 of N)
pub const DEFAULT_HASH_LOG_N: u8 = 15;

/// Password complexity requirements.
///
/// A password passes when it is long enough and mixes at least
/// `min_character_classes` of: uppercase, lowercase, digit, special.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub min_character_classes: usize,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            min_character_classes: 3,
        }
    }
}

impl PasswordRequirements {
    /// Human readable form of the policy, used in error messages
    pub fn describe(&self) -> String {
        format!(
            "Password must be at least {} characters and contain at least {} of: uppercase letters, lowercase letters, digits, special characters",
            self.min_length, self.min_character_classes
        )
    }
}

/// scrypt parameters for a given cost
pub fn hash_params(log_n: u8) -> anyhow::Result<Params> {
    Params::new(log_n, 8, 1, 32).map_err(|e| anyhow::anyhow!("invalid scrypt params: {e}"))
}

/// Hash a password using scrypt with explicit parameters
pub fn hash_password_with(plain: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Scrypt
        .hash_password_customized(plain.as_bytes(), None, None, params, &salt)?
        .to_string();
    Ok(hash)
}

/// Verify a password against a hash
pub fn verify_password(hash: &str, plain: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Scrypt.verify_password(plain.as_bytes(), &parsed_hash).is_ok()
}

/// Number of character classes present in `password`
pub fn character_classes(password: &str) -> usize {
    [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
    ]
    .into_iter()
    .filter(|present| *present)
    .count()
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    password.chars().count() >= requirements.min_length
        && character_classes(password) >= requirements.min_character_classes
}

/// Hash a password with explicit parameters and zeroize the original
pub fn hash_password_secure(plain: &mut String, params: Params) -> anyhow::Result<String> {
    let hash = hash_password_with(plain, params);
    plain.zeroize();
    hash
}
