use crate::models::{Role, User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "taskhub";
const VALIDITY_DAYS: i64 = 7;

/// Signed session token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Returned for every verification failure, with no hint as to which
/// check rejected the token.
#[derive(Debug, PartialEq, Eq)]
pub struct TokenError;

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid or expired token")
    }
}

impl std::error::Error for TokenError {}

/// Issues and verifies HS256 session tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a 7-day session token for a user. There is no refresh
    /// mechanism; clients log in again after expiry.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::days(VALIDITY_DAYS)).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError)
    }

    /// Check signature, issuer, and expiry. Malformed input, a bad
    /// signature, a foreign issuer, and an expired token are all the
    /// same failure to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("token rejected: {}", err);
                TokenError
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sign_raw(secret: &str, claims: &Claims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issue_then_verify_roundtrip() {
        let service = TokenService::new("test-secret");
        let user = test_user();

        let token = service.issue(&user).unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::User);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn malformed_token_rejected() {
        let service = TokenService::new("test-secret");
        assert_eq!(service.verify("not.a.token"), Err(TokenError));
        assert_eq!(service.verify(""), Err(TokenError));
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = TokenService::new("secret-one");
        let verifier = TokenService::new("secret-two");

        let token = issuer.issue(&test_user()).unwrap();
        assert_eq!(verifier.verify(&token), Err(TokenError));
    }

    #[test]
    fn expired_token_rejected() {
        let service = TokenService::new("test-secret");
        let user = test_user();
        let now = Utc::now();

        let claims = Claims {
            sub: user.id,
            email: user.email,
            role: user.role,
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = sign_raw("test-secret", &claims);
        assert_eq!(service.verify(&token), Err(TokenError));
    }

    #[test]
    fn foreign_issuer_rejected() {
        let service = TokenService::new("test-secret");
        let user = test_user();
        let now = Utc::now();

        let claims = Claims {
            sub: user.id,
            email: user.email,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::days(1)).timestamp(),
            iss: "someone-else".to_string(),
        };

        let token = sign_raw("test-secret", &claims);
        assert_eq!(service.verify(&token), Err(TokenError));
    }
}
