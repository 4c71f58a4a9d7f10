//! Signed bearer token issuance and verification.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use super::claims::Claims;
use super::principal::Principal;

/// Why a token failed verification.
///
/// Callers at the API boundary must collapse all variants into a single
/// unauthenticated outcome; the distinction exists for logging only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token is malformed")]
    Malformed,

    #[error("token has expired")]
    Expired,
}

/// A freshly issued token with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Expiry as a Unix timestamp.
    pub expires_at: i64,
}

/// Creates and verifies signed, time-bounded bearer tokens.
///
/// Pure: output depends only on the input, the process-wide signing key and
/// the current time. The key is loaded once at startup and never logged.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// Access token lifetime in seconds, for the `expiresIn` response field.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    /// Issue an access token carrying the principal's email and display name.
    pub fn issue_access_token(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.issue(
            principal.id,
            self.access_ttl,
            principal.email.clone(),
            principal.display_name.clone(),
        )
    }

    /// Issue a refresh token. No auxiliary claims: it is only good for
    /// minting a new token pair.
    pub fn issue_refresh_token(&self, user_id: i64) -> Result<IssuedToken, TokenError> {
        self.issue(user_id, self.refresh_ttl, None, None)
    }

    fn issue(
        &self,
        user_id: i64,
        ttl: Duration,
        email: Option<String>,
        name: Option<String>,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = (now + ttl).timestamp();

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at,
            email,
            name,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Malformed)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, structure and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        TokenError::InvalidSignature
                    }
                    _ => TokenError::Malformed,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Extract the subject id. Runs full verification first; an unverified
    /// payload is never trusted.
    pub fn subject_id(&self, token: &str) -> Result<i64, TokenError> {
        let claims = self.verify(token)?;
        claims.user_id().ok_or(TokenError::Malformed)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys deliberately omitted.
        f.debug_struct("TokenCodec")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-for-unit-tests-minimum-32-chars-long";

    fn test_codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET, 3600, 86400)
    }

    fn bob() -> Principal {
        Principal {
            id: 42,
            email: Some("bob@example.com".to_string()),
            display_name: Some("Bob".to_string()),
            attributes: None,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let codec = test_codec();
        let issued = codec.issue_access_token(&bob()).unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email.as_deref(), Some("bob@example.com"));
        assert_eq!(claims.name.as_deref(), Some("Bob"));
        assert_eq!(claims.exp, issued.expires_at);
        assert_eq!(codec.subject_id(&issued.token).unwrap(), 42);
    }

    #[test]
    fn test_refresh_token_has_no_profile_claims() {
        let codec = test_codec();
        let issued = codec.issue_refresh_token(42).unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert!(claims.email.is_none());
        assert!(claims.name.is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let codec = TokenCodec::new(TEST_SECRET, -300, -300);
        let issued = codec.issue_access_token(&bob()).unwrap();

        assert_eq!(codec.verify(&issued.token), Err(TokenError::Expired));
        assert_eq!(codec.subject_id(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let codec = test_codec();
        let issued = codec.issue_access_token(&bob()).unwrap();

        // Flip the last signature character. A and Q differ in their high
        // bits, so the decoded signature bytes change either way.
        let mut tampered = issued.token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'Q' } else { 'A' });

        assert!(codec.verify(&tampered).is_err());
    }

    #[test]
    fn test_wrong_key_is_invalid_signature() {
        let codec = test_codec();
        let other = TokenCodec::new("another-secret-that-is-also-32-chars!!", 3600, 86400);
        let issued = codec.issue_access_token(&bob()).unwrap();

        assert_eq!(other.verify(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_garbage_token_is_malformed() {
        let codec = test_codec();
        assert_eq!(codec.verify("not-a-jwt"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
    }
}
