use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use tracing::debug;

use crate::claims::Claims;
use crate::config::TokenConfig;
use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_seconds.into();
        Self {
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Cryptographically verify the token and return its claims. Pure
    /// function, no I/O.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                debug!(user_id = %data.claims.user_id, "verified session token");
                Ok(data.claims)
            }
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::Expired),
                _ => Err(AuthError::Malformed(err.to_string())),
            },
        }
    }

    /// Decode claims without checking the signature or expiry. Trusted only
    /// for extracting a cleanup routing key from a token that is already
    /// known-bad, never for authorization decisions.
    pub fn decode_unverified(token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::signer::{TokenIdentity, TokenPurpose, TokenSigner};
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    fn config() -> TokenConfig {
        TokenConfig::new("unit-test-secret").with_leeway(0)
    }

    fn identity() -> TokenIdentity {
        TokenIdentity {
            user_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: Role::Admin,
            status: Some("Active".to_string()),
        }
    }

    fn expired_token(secret: &str) -> (String, Uuid) {
        let user_id = Uuid::new_v4();
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            email: "old@x.com".to_string(),
            role: Role::Customer,
            status: None,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign");
        (token, user_id)
    }

    #[test]
    fn verify_round_trips_issued_token() {
        let signer = TokenSigner::new(config());
        let verifier = TokenVerifier::new(&config());
        let id = identity();

        let issued = signer.issue(&id, TokenPurpose::Session).expect("issue");
        let claims = verifier.verify(&issued.token).expect("verify");
        assert_eq!(claims.user_id, id.user_id);
        assert_eq!(claims.email, id.email);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn verify_rejects_expired_token_distinctly() {
        let verifier = TokenVerifier::new(&config());
        let (token, _) = expired_token("unit-test-secret");

        let err = verifier.verify(&token).expect_err("should be expired");
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn verify_rejects_wrong_secret_as_malformed() {
        let signer = TokenSigner::new(TokenConfig::new("other-secret"));
        let verifier = TokenVerifier::new(&config());

        let issued = signer
            .issue(&identity(), TokenPurpose::Session)
            .expect("issue");
        let err = verifier.verify(&issued.token).expect_err("should reject");
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn verify_rejects_garbage_as_malformed() {
        let verifier = TokenVerifier::new(&config());
        let err = verifier.verify("not.a.token").expect_err("should reject");
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[test]
    fn decode_unverified_reads_expired_and_foreign_tokens() {
        let (token, user_id) = expired_token("some-entirely-different-secret");
        let claims = TokenVerifier::decode_unverified(&token).expect("decode");
        assert_eq!(claims.user_id, user_id);
    }

    #[test]
    fn decode_unverified_rejects_garbage() {
        assert!(TokenVerifier::decode_unverified("garbage").is_none());
    }
}
