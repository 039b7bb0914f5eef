use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};
use crate::roles::Role;

/// Identity snapshot a token is minted for.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub status: Option<String>,
}

/// Why a token is being issued. Registration tokens are meant for immediate
/// use and get a short lifetime; login tokens are long-lived sessions and
/// additionally carry the account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Registration,
    Session,
}

pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    config: TokenConfig,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        Self {
            encoding_key,
            config,
        }
    }

    /// Mint a signed token for the identity. No side effects; fails only if
    /// signing itself is impossible.
    pub fn issue(&self, identity: &TokenIdentity, purpose: TokenPurpose) -> AuthResult<IssuedToken> {
        let now = Utc::now();
        let ttl = match purpose {
            TokenPurpose::Registration => self.config.registration_ttl_seconds,
            TokenPurpose::Session => self.config.session_ttl_seconds,
        };
        let expires_at = now + Duration::seconds(ttl);

        let status = match purpose {
            TokenPurpose::Registration => None,
            TokenPurpose::Session => identity.status.clone(),
        };

        let claims = Claims {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            status,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::TokenVerifier;

    fn identity(role: Role) -> TokenIdentity {
        TokenIdentity {
            user_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role,
            status: Some("Active".to_string()),
        }
    }

    fn config() -> TokenConfig {
        TokenConfig::new("unit-test-secret")
    }

    #[test]
    fn registration_token_omits_status() {
        let signer = TokenSigner::new(config());
        let verifier = TokenVerifier::new(&config());

        let issued = signer
            .issue(&identity(Role::Merchant), TokenPurpose::Registration)
            .expect("issue");
        let claims = verifier.verify(&issued.token).expect("verify");

        assert_eq!(claims.role, Role::Merchant);
        assert!(claims.status.is_none());
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn session_token_carries_status_and_long_ttl() {
        let signer = TokenSigner::new(config());
        let verifier = TokenVerifier::new(&config());

        let before = Utc::now();
        let issued = signer
            .issue(&identity(Role::Customer), TokenPurpose::Session)
            .expect("issue");
        let claims = verifier.verify(&issued.token).expect("verify");

        assert_eq!(claims.status.as_deref(), Some("Active"));
        let expected = before + Duration::days(30);
        let skew = (issued.expires_at - expected).num_seconds().abs();
        assert!(skew <= 5, "session expiry should be ~30 days out, skew {skew}s");
    }

    #[test]
    fn registration_ttl_is_shorter_than_session_ttl() {
        let signer = TokenSigner::new(config());
        let id = identity(Role::Admin);

        let registration = signer.issue(&id, TokenPurpose::Registration).expect("issue");
        let session = signer.issue(&id, TokenPurpose::Session).expect("issue");
        assert!(registration.expires_at < session.expires_at);
    }
}
