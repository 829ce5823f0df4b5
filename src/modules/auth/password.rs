use pbkdf2::pbkdf2;
use rand::Rng;
use subtle::ConstantTimeEq;
use thiserror::Error;

use super::error::AuthError;
use crate::HmacSha256;

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

pub const DEFAULT_HASH_ITERATIONS: u32 = 100_000;
pub const MIN_PASSWORD_LENGTH: usize = 6;
const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Reasons a password fails the strength policy
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("must be at least 6 characters")]
    TooShort,
    #[error("must contain an uppercase letter")]
    NoUppercase,
    #[error("must contain a lowercase letter")]
    NoLowercase,
    #[error("must contain a number")]
    NoNumber,
    #[error("must contain a special character")]
    NoSpecialChar,
}

/// Check password strength
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordError::NoUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordError::NoLowercase);
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return Err(PasswordError::NoNumber);
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(PasswordError::NoSpecialChar);
    }
    Ok(())
}

/// One-way password hashing with PBKDF2-HMAC-SHA256.
///
/// Digests are self-describing: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`,
/// so a hasher configured with different iterations still verifies older digests.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        if password.is_empty() {
            return Err(AuthError::Crypto("cannot hash an empty password".to_string()));
        }

        let salt = generate_random_salt();
        let digest = derive_key(password, &salt, self.iterations);

        Ok(format!(
            "{}${}${}${}",
            HASH_SCHEME,
            self.iterations,
            hex::encode(&salt),
            hex::encode(digest)
        ))
    }

    /// Constant-time check of `password` against a stored digest.
    ///
    /// A malformed digest never matches.
    pub fn verify(&self, password: &str, digest: &str) -> bool {
        let Some((iterations, salt, expected)) = parse_digest(digest) else {
            return false;
        };

        let actual = derive_key(password, &salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

fn generate_random_salt() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN).map(|_| rng.gen()).collect()
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut key = vec![0u8; DIGEST_LEN];
    pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn parse_digest(digest: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = digest.split('$');
    if parts.next()? != HASH_SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok().filter(|n| *n > 0)?;
    let salt = hex::decode(parts.next()?).ok()?;
    let expected = hex::decode(parts.next()?).ok()?;
    if parts.next().is_some() || expected.len() != DIGEST_LEN {
        return None;
    }
    Some((iterations, salt, expected))
}
