use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Cannot parse the token or its signature does not verify.
    #[error("token verification failed: {0}")]
    Malformed(String),
    /// Signature is valid but the token is past its expiry.
    #[error("token has expired")]
    Expired,
    /// Signing failed; a process-level misconfiguration, not a per-request
    /// condition.
    #[error("failed to sign token: {0}")]
    Signing(String),
}
