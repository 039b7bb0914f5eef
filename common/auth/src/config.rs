/// Runtime configuration shared by the token signer and verifier.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HMAC signing secret, loaded once at process start.
    pub secret: String,
    /// Lifetime of registration-issued tokens (meant for immediate use).
    pub registration_ttl_seconds: i64,
    /// Lifetime of login-issued tokens (long-lived sessions).
    pub session_ttl_seconds: i64,
    /// Allowable clock skew in seconds when validating exp.
    pub leeway_seconds: u32,
}

const REGISTRATION_TTL_SECONDS: i64 = 24 * 60 * 60;
const SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

impl TokenConfig {
    /// Construct config with the stock TTLs (24 hours / 30 days) and a
    /// 30 second leeway.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            registration_ttl_seconds: REGISTRATION_TTL_SECONDS,
            session_ttl_seconds: SESSION_TTL_SECONDS,
            leeway_seconds: 30,
        }
    }

    pub fn with_ttls(mut self, registration_seconds: i64, session_seconds: i64) -> Self {
        self.registration_ttl_seconds = registration_seconds;
        self.session_ttl_seconds = session_seconds;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}
