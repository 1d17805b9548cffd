//! PIN hashing using Argon2id
//!
//! The settings PIN is the only credential Shoebox stores. It is kept as a
//! PHC-format Argon2id hash in `settings.json` and never leaves the device.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{ShoeboxError, ShoeboxResult};

/// Minimum accepted PIN length
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum accepted PIN length
pub const MAX_PIN_LENGTH: usize = 12;

/// Check PIN shape: digits only, 4-12 characters
pub fn validate_pin(pin: &str) -> ShoeboxResult<()> {
    if pin.len() < MIN_PIN_LENGTH || pin.len() > MAX_PIN_LENGTH {
        return Err(ShoeboxError::Settings(format!(
            "PIN must be {}-{} digits",
            MIN_PIN_LENGTH, MAX_PIN_LENGTH
        )));
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ShoeboxError::Settings("PIN must contain digits only".into()));
    }

    Ok(())
}

/// Hash a PIN into a PHC string
pub fn hash_pin(pin: &str) -> ShoeboxResult<String> {
    validate_pin(pin)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| ShoeboxError::Settings(format!("PIN hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a PIN against a PHC string
pub fn verify_pin(pin: &str, phc: &str) -> ShoeboxResult<bool> {
    let parsed = PasswordHash::new(phc)
        .map_err(|e| ShoeboxError::Settings(format!("Stored PIN hash is corrupt: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(pin.as_bytes(), &parsed)
        .is_ok())
}
