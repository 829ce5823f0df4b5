use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::AuthError;
use crate::modules::utils::time::get_current_timestamp;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_VERIFICATION_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Signing secret and lifetimes for both token kinds
#[derive(Clone)]
pub struct TokenConfig {
    secret: Vec<u8>,
    pub access_ttl: Duration,
    pub verification_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into().into_bytes(),
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            verification_ttl: DEFAULT_VERIFICATION_TOKEN_TTL,
        }
    }

    pub fn access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn verification_ttl(mut self, ttl: Duration) -> Self {
        self.verification_ttl = ttl;
        self
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("verification_ttl", &self.verification_ttl)
            .finish()
    }
}

/// Decoded token payload.
///
/// `verify` marks a verification token; access tokens omit it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub verify: bool,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn is_verification(&self) -> bool {
        self.verify
    }
}

/// Issues and checks HS256-signed bearer tokens.
///
/// Tokens are stateless: there is no revocation list, expiry is the only
/// way a token stops being accepted.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    verification_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // expiry is a hard cut-off
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(&config.secret),
            decoding_key: DecodingKey::from_secret(&config.secret),
            validation,
            access_ttl: config.access_ttl,
            verification_ttl: config.verification_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn verification_ttl(&self) -> Duration {
        self.verification_ttl
    }

    /// Issue an access token for `username`
    pub fn issue_access(&self, username: &str) -> Result<String, AuthError> {
        self.sign(&self.claims_for(username, false, self.access_ttl)?)
    }

    /// Issue a verification token (purpose marker set) for `username`
    pub fn issue_verification(&self, username: &str) -> Result<String, AuthError> {
        self.sign(&self.claims_for(username, true, self.verification_ttl)?)
    }

    /// Check signature and expiry, whatever the token's purpose
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Verify a token that must be an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.is_verification() {
            return Err(AuthError::InvalidTokenPurpose);
        }
        Ok(claims)
    }

    /// Verify a token that must carry the verification marker
    pub fn verify_verification(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if !claims.is_verification() {
            return Err(AuthError::InvalidTokenPurpose);
        }
        Ok(claims)
    }

    fn claims_for(&self, username: &str, verify: bool, ttl: Duration) -> Result<Claims, AuthError> {
        let now = get_current_timestamp();
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or_else(|| AuthError::Crypto(format!("token lifetime of {}s is out of range", ttl.as_secs())))?;

        Ok(Claims {
            username: username.to_string(),
            verify,
            iat: now,
            exp,
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::Crypto(format!("failed to sign token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&TokenConfig::new("test-secret"))
    }

    #[test]
    fn test_access_token_roundtrip() {
        let tokens = service();
        let token = tokens.issue_access("alice").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(!claims.is_verification());
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TOKEN_TTL.as_secs());
        assert!(tokens.verify_access(&token).is_ok());
    }

    #[test]
    fn test_verification_token_carries_marker() {
        let tokens = service();
        let token = tokens.issue_verification("alice").unwrap();

        let claims = tokens.verify_verification(&token).unwrap();
        assert!(claims.verify);
        assert_eq!(claims.exp - claims.iat, DEFAULT_VERIFICATION_TOKEN_TTL.as_secs());
    }

    #[test]
    fn test_purpose_is_enforced_both_ways() {
        let tokens = service();
        let access = tokens.issue_access("alice").unwrap();
        let verification = tokens.issue_verification("alice").unwrap();

        assert!(matches!(
            tokens.verify_verification(&access),
            Err(AuthError::InvalidTokenPurpose)
        ));
        assert!(matches!(
            tokens.verify_access(&verification),
            Err(AuthError::InvalidTokenPurpose)
        ));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let other = TokenService::new(&TokenConfig::new("another-secret"));
        let token = other.issue_access("alice").unwrap();

        assert!(matches!(service().verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let tokens = service();
        assert!(matches!(tokens.verify(""), Err(AuthError::InvalidToken)));
        assert!(matches!(tokens.verify("not.a.jwt"), Err(AuthError::InvalidToken)));

        let mut token = tokens.issue_access("alice").unwrap();
        token.push('x');
        assert!(matches!(tokens.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_distinguished() {
        let tokens = service();
        let now = get_current_timestamp();
        let token = tokens
            .sign(&Claims {
                username: "alice".to_string(),
                verify: true,
                iat: now - 120,
                exp: now - 60,
            })
            .unwrap();

        assert!(matches!(tokens.verify(&token), Err(AuthError::ExpiredToken)));
        assert!(matches!(
            tokens.verify_verification(&token),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn test_huge_lifetime_is_an_error_not_an_overflow() {
        let tokens = TokenService::new(
            &TokenConfig::new("test-secret")
                .access_ttl(Duration::from_secs(u64::MAX))
                .verification_ttl(Duration::from_secs(u64::MAX)),
        );

        assert!(matches!(tokens.issue_access("alice"), Err(AuthError::Crypto(_))));
        assert!(matches!(
            tokens.issue_verification("alice"),
            Err(AuthError::Crypto(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", TokenConfig::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
