//! Session tokens: issue on login, validate on every record RPC

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use keepsafe_core::{AuthToken, UserId, VaultError, VaultResult};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Binds opaque bearer tokens to user ids
pub trait Authenticator: Send + Sync {
    fn issue(&self, user: &UserId) -> VaultResult<AuthToken>;

    /// Expired, malformed and wrongly-signed tokens are all `Authentication`
    fn validate(&self, token: &AuthToken) -> VaultResult<UserId>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: u64,
    exp: u64,
}

/// HS256 JWTs signed with the server's token secret
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthenticator {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            ttl,
        }
    }

    fn issue_at(&self, user: &UserId, now: u64) -> VaultResult<AuthToken> {
        let claims = Claims {
            sub: user.as_str().to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_secs()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(AuthToken::new)
            .map_err(|e| VaultError::storage(format!("signing session token: {e}")))
    }
}

impl Authenticator for JwtAuthenticator {
    fn issue(&self, user: &UserId) -> VaultResult<AuthToken> {
        self.issue_at(user, jsonwebtoken::get_current_timestamp())
    }

    fn validate(&self, token: &AuthToken) -> VaultResult<UserId> {
        let data = decode::<Claims>(token.as_str(), &self.decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => VaultError::unauthenticated("token expired"),
                ErrorKind::InvalidSignature => VaultError::unauthenticated("invalid token signature"),
                _ => VaultError::unauthenticated("malformed token"),
            },
        )?;
        if data.claims.sub.is_empty() {
            return Err(VaultError::unauthenticated("token has no subject"));
        }
        Ok(UserId::new(data.claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator(secret: &str) -> JwtAuthenticator {
        JwtAuthenticator::new(&SecretString::from(secret.to_string()), Duration::from_secs(3600))
    }

    #[test]
    fn test_issue_validate_roundtrip() {
        let auth = authenticator("server-secret");
        let user = UserId::new("u-1");
        let token = auth.issue(&user).unwrap();
        assert_eq!(auth.validate(&token).unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = authenticator("one").issue(&UserId::new("u-1")).unwrap();
        let err = authenticator("two").validate(&token).unwrap_err();
        assert!(matches!(err, VaultError::Authentication(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let auth = authenticator("server-secret");
        let past = jsonwebtoken::get_current_timestamp() - 7200;
        let token = auth.issue_at(&UserId::new("u-1"), past).unwrap();
        match auth.validate(&token) {
            Err(VaultError::Authentication(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        let auth = authenticator("server-secret");
        for raw in ["", "not-a-jwt", "a.b.c"] {
            assert!(matches!(
                auth.validate(&AuthToken::new(raw)),
                Err(VaultError::Authentication(_))
            ));
        }
    }

    #[test]
    fn test_claims_carry_subject_and_window() {
        let auth = authenticator("server-secret");
        let token = auth.issue_at(&UserId::new("u-9"), 1_000).unwrap();
        let claims: Claims = jsonwebtoken::dangerous::insecure_decode(token.as_str())
            .unwrap()
            .claims;
        assert_eq!(claims.sub, "u-9");
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 4_600);
    }
}
