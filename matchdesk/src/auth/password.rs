//! Password hashing and verification.
//!
//! Stored credentials have the shape `<derivedKeyHex>.<saltHex>`: a 64-byte Argon2id key
//! followed by the 16-byte random salt it was derived with. Anything else is treated as a
//! legacy value and never verifies.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::errors::Error;

const KEY_LEN: usize = 64;
const SALT_LEN: usize = 16;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(KEY_LEN)).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

fn derive_key(password: &str, salt: &[u8], params: Argon2Params) -> Result<[u8; KEY_LEN], Error> {
    let mut key = [0u8; KEY_LEN];
    params
        .to_argon2()?
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| Error::Internal {
            operation: format!("derive password key: {e}"),
        })?;
    Ok(key)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let mut salt = [0u8; SALT_LEN];
    rng().fill(&mut salt);

    let key = derive_key(password, &salt, params)?;
    Ok(format!("{}.{}", hex::encode(key), hex::encode(salt)))
}

/// Whether `stored` is a well formed `<128 hex>.<32 hex>` credential. Hex digits may be in
/// either case, matching what [`verify_password`] decodes.
pub fn is_valid_hash_format(stored: &str) -> bool {
    let Some((key, salt)) = stored.split_once('.') else {
        return false;
    };
    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());

    key.len() == KEY_LEN * 2 && salt.len() == SALT_LEN * 2 && is_hex(key) && is_hex(salt)
}

/// Verify a password against a stored credential.
///
/// Malformed credentials fail closed with `Ok(false)`. The derived keys are compared in
/// constant time.
pub fn verify_password(password: &str, stored: &str, params: Argon2Params) -> Result<bool, Error> {
    if !is_valid_hash_format(stored) {
        return Ok(false);
    }
    let Some((key_hex, salt_hex)) = stored.split_once('.') else {
        return Ok(false);
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(key_hex), hex::decode(salt_hex)) else {
        return Ok(false);
    };

    let actual = derive_key(password, &salt, params)?;
    Ok(constant_time_eq(&actual, &expected))
}

/// Compare two byte slices without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Generate a random password for accounts created without one: 18 bytes, base64url.
pub fn generate_strong_password() -> String {
    let mut bytes = [0u8; 18];
    rng().fill(&mut bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash on the blocking pool; Argon2 is deliberately slow.
pub async fn hash_password_blocking(password: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_password(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify on the blocking pool.
pub async fn verify_password_blocking(password: String, stored: String, params: Argon2Params) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?
}
