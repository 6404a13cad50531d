//! JWT Token Service
//! Mission: Issue and verify signed, time-bounded access and refresh tokens

use crate::auth::models::{Claims, Role, TokenType};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::Sha256;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime either token class may carry (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

fn ttl_secs(ttl: Duration) -> i64 {
    ttl.as_secs().clamp(1, MAX_TTL_SECS) as i64
}

/// Why a token was not accepted (or could not be produced)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidSignature,
    Expired,
    NotYetValid,
    WrongType { expected: TokenType, found: TokenType },
    Malformed(String),
    Signing(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidSignature => write!(f, "token signature mismatch"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::NotYetValid => write!(f, "token issued in the future"),
            TokenError::WrongType { expected, found } => {
                write!(f, "expected {:?} token, got {:?}", expected, found)
            }
            TokenError::Malformed(e) => write!(f, "malformed token: {}", e),
            TokenError::Signing(e) => write!(f, "failed to sign token: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}

/// Stateless token issuer/verifier. Both token classes share one HS256 secret.
pub struct TokenService {
    secret: Vec<u8>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl TokenService {
    /// TTLs are clamped to `1..=MAX_TTL_SECS` seconds so `exp > iat` always holds.
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time window is checked against our own clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims = HashSet::new();

        Self {
            secret: secret.to_vec(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl: ttl_secs(access_ttl),
            refresh_ttl: ttl_secs(refresh_ttl),
        }
    }

    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl
    }

    /// Issue a short-lived access token
    pub fn issue(&self, subject: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(subject, role, TokenType::Access, Utc::now().timestamp())
    }

    /// Issue a long-lived refresh token
    pub fn issue_refresh(&self, subject: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(subject, role, TokenType::Refresh, Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        role: Role,
        typ: TokenType,
        now: i64,
    ) -> Result<String, TokenError> {
        let ttl = match typ {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: subject.to_string(),
            role,
            iat: now,
            exp: now.saturating_add(ttl),
            typ,
        };

        debug!(
            subject,
            role = role.as_str(),
            typ = ?typ,
            ttl_secs = ttl,
            "Issuing token"
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify an access token against the current clock
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenType::Access, Utc::now().timestamp())
    }

    /// Verify a refresh token against the current clock
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, TokenType::Refresh, Utc::now().timestamp())
    }

    /// A token is accepted only while `iat <= now < exp`.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenType,
        now: i64,
    ) -> Result<Claims, TokenError> {
        self.check_signature(token)?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;

        if claims.typ != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.typ,
            });
        }
        if now < claims.iat {
            return Err(TokenError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Signature is checked over the raw segments before anything is decoded, so an
    /// altered byte anywhere in the token reports as a signature failure.
    fn check_signature(&self, token: &str) -> Result<(), TokenError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| TokenError::Malformed("missing signature segment".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Malformed(format!("HMAC key error: {}", e)))?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn service() -> TokenService {
        TokenService::new(
            b"test-secret-key-12345",
            Duration::from_secs(900),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    fn sign_raw(secret: &[u8], signing_input: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(signing_input.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", signing_input, sig)
    }

    #[test]
    fn test_issue_and_verify() {
        let svc = service();
        let token = svc.issue("alice", Role::User).unwrap();
        assert!(!token.is_empty());
        assert_eq!(token.split('.').count(), 3);

        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.typ, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_validity_window_boundaries() {
        let svc = service();
        let token = svc.issue_at("bob", Role::Admin, TokenType::Access, NOW).unwrap();

        let claims = svc.verify_at(&token, TokenType::Access, NOW).unwrap();
        assert_eq!(claims.iat, NOW);
        assert_eq!(claims.exp, NOW + 900);

        assert!(svc.verify_at(&token, TokenType::Access, NOW + 899).is_ok());
        assert_eq!(
            svc.verify_at(&token, TokenType::Access, NOW + 900),
            Err(TokenError::Expired)
        );
        assert_eq!(
            svc.verify_at(&token, TokenType::Access, NOW + 10_000),
            Err(TokenError::Expired)
        );
        assert_eq!(
            svc.verify_at(&token, TokenType::Access, NOW - 1),
            Err(TokenError::NotYetValid)
        );
    }

    #[test]
    fn test_refresh_has_its_own_ttl() {
        let svc = service();
        let token = svc.issue_at("carol", Role::User, TokenType::Refresh, NOW).unwrap();

        let claims = svc
            .verify_at(&token, TokenType::Refresh, NOW + 3600)
            .unwrap();
        assert_eq!(claims.exp, NOW + 7 * 24 * 3600);
        assert_eq!(claims.typ, TokenType::Refresh);
    }

    #[test]
    fn test_token_classes_not_interchangeable() {
        let svc = service();
        let refresh = svc.issue_refresh("dave", Role::User).unwrap();
        let access = svc.issue("dave", Role::User).unwrap();

        assert!(matches!(
            svc.verify(&refresh),
            Err(TokenError::WrongType { .. })
        ));
        assert!(matches!(
            svc.verify_refresh(&access),
            Err(TokenError::WrongType { .. })
        ));
    }

    #[test]
    fn test_any_tampered_byte_fails_signature() {
        let svc = service();
        let token = svc.issue_at("alice", Role::User, TokenType::Access, NOW).unwrap();
        let bytes = token.as_bytes();

        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();

            assert_eq!(
                svc.verify_at(&tampered, TokenType::Access, NOW),
                Err(TokenError::InvalidSignature),
                "byte {} altered",
                i
            );
        }
    }

    #[test]
    fn test_different_secrets_reject() {
        let svc1 = service();
        let svc2 = TokenService::new(
            b"another-secret",
            Duration::from_secs(900),
            Duration::from_secs(900),
        );

        let token = svc1.issue("alice", Role::User).unwrap();
        assert_eq!(svc2.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed_tokens() {
        let svc = service();
        let secret = b"test-secret-key-12345";

        assert!(matches!(svc.verify(""), Err(TokenError::Malformed(_))));
        assert!(matches!(svc.verify("garbage"), Err(TokenError::Malformed(_))));

        // Correctly signed but not a JWT
        let two_part = sign_raw(secret, "justonepart");
        assert!(matches!(svc.verify(&two_part), Err(TokenError::Malformed(_))));

        // Correctly signed, JWT-shaped, but the payload is not JSON claims
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"not json");
        let bad_payload = sign_raw(secret, &format!("{}.{}", header, payload));
        assert!(matches!(svc.verify(&bad_payload), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_sub_second_ttl_still_expires_after_issue() {
        let svc = TokenService::new(b"k", Duration::from_millis(10), Duration::ZERO);
        assert_eq!(svc.access_ttl_secs(), 1);
        assert_eq!(svc.refresh_ttl_secs(), 1);

        let token = svc.issue_at("eve", Role::User, TokenType::Access, NOW).unwrap();
        assert!(svc.verify_at(&token, TokenType::Access, NOW).is_ok());
        assert_eq!(
            svc.verify_at(&token, TokenType::Access, NOW + 1),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let svc = TokenService::new(
            b"k",
            Duration::from_secs(u64::MAX),
            Duration::from_secs(i64::MAX as u64 + 1),
        );
        assert_eq!(svc.access_ttl_secs(), MAX_TTL_SECS as i64);
        assert_eq!(svc.refresh_ttl_secs(), MAX_TTL_SECS as i64);

        let token = svc.issue_at("eve", Role::User, TokenType::Access, NOW).unwrap();
        let claims = svc.verify_at(&token, TokenType::Access, NOW).unwrap();
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.exp, NOW + MAX_TTL_SECS as i64);
    }

    #[test]
    fn test_expiry_saturates_near_clock_limit() {
        let svc = service();
        let late = i64::MAX - 10;
        let token = svc.issue_at("eve", Role::User, TokenType::Access, late).unwrap();

        let claims = svc.verify_at(&token, TokenType::Access, late).unwrap();
        assert_eq!(claims.exp, i64::MAX);
    }
}
