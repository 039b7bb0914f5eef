use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header::AUTHORIZATION, request::Parts, HeaderValue};
use common_auth::{AuthError, Claims, GuardError, TokenVerifier};
use common_http_errors::ApiError;
use tracing::warn;

use crate::sessions::{ActiveSessionRegistry, RevocationRegistry};

/// Identity attached to a request once the gate has accepted its token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub claims: Claims,
    pub token: String,
}

/// The per-request token check. Order is a contract, not an accident:
/// revocation is consulted before the signature, so a blacklisted token is
/// rejected even while cryptographically valid and unexpired.
#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
    ActiveSessionRegistry: FromRef<S>,
    RevocationRegistry: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parse_bearer(parts.headers.get(AUTHORIZATION))?;

        let revoked = RevocationRegistry::from_ref(state);
        let is_revoked = revoked
            .contains(&token)
            .await
            .map_err(|err| ApiError::dependency("Error checking blacklisted token", err))?;

        if is_revoked {
            // The token is already known-bad; its claims are trusted only as
            // a routing key for cleanup, never for authorization.
            if let Some(claims) = TokenVerifier::decode_unverified(&token) {
                let active = ActiveSessionRegistry::from_ref(state);
                if let Err(err) = active.remove_if_matches(claims.user_id, &token).await {
                    warn!(
                        user_id = %claims.user_id,
                        error = ?err,
                        "Failed to purge active session for revoked token"
                    );
                }
            }
            return Err(ApiError::authentication("Token is invalid or expired"));
        }

        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let claims = match verifier.verify(&token) {
            Ok(claims) => claims,
            Err(AuthError::Expired) => {
                return Err(ApiError::authentication("Token has expired"))
            }
            Err(err) => {
                return Err(ApiError::authentication_detail(
                    "Invalid token",
                    err.to_string(),
                ))
            }
        };

        Ok(Self { claims, token })
    }
}

fn parse_bearer(value: Option<&HeaderValue>) -> Result<String, ApiError> {
    let value = match value {
        Some(value) => value,
        None => return Err(ApiError::validation("Token is required")),
    };

    let raw = value
        .to_str()
        .map_err(|_| invalid_format())?
        .trim();

    let token = raw.strip_prefix("Bearer ").ok_or_else(invalid_format)?.trim();
    if token.is_empty() {
        return Err(invalid_format());
    }

    Ok(token.to_owned())
}

fn invalid_format() -> ApiError {
    ApiError::authentication("No token provided or invalid token format")
}

/// Adapter for role guard failures in handlers returning `ApiError`.
pub fn forbid(err: GuardError) -> ApiError {
    ApiError::forbidden(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bearer_accepts_valid_token() {
        let header = HeaderValue::from_static("Bearer abc.def.ghi");
        let token = parse_bearer(Some(&header)).expect("token");
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn parse_bearer_rejects_missing_header_before_any_lookup() {
        let err = parse_bearer(None).expect_err("should reject");
        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[test]
    fn parse_bearer_rejects_wrong_scheme() {
        let header = HeaderValue::from_static("Basic credentials");
        let err = parse_bearer(Some(&header)).expect_err("should reject");
        assert!(matches!(err, ApiError::Authentication { .. }));
    }

    #[test]
    fn parse_bearer_rejects_empty_value() {
        let header = HeaderValue::from_static("Bearer    ");
        let err = parse_bearer(Some(&header)).expect_err("should reject empty token");
        assert!(matches!(err, ApiError::Authentication { .. }));
    }
}
