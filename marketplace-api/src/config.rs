use anyhow::{Context, Result};
use common_auth::TokenConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub token: TokenConfig,
    /// Applied to every outbound HTTP call. The system this replaces ran
    /// without one; see DESIGN.md.
    pub outbound_timeout: Duration,
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub event_webhook_url: Option<String>,
    pub event_webhook_bearer: Option<String>,
    /// Substituted for loopback client addresses before geolocation.
    pub tracking_fallback_ip: String,
    pub allowed_origins: Vec<String>,
}

pub fn load_config() -> Result<AppConfig> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

    let mut token = TokenConfig::new(secret);
    if let Some(ttl) = i64_from_env("REGISTRATION_TOKEN_TTL_SECONDS")? {
        token.registration_ttl_seconds = ttl;
    }
    if let Some(ttl) = i64_from_env("SESSION_TOKEN_TTL_SECONDS")? {
        token.session_ttl_seconds = ttl;
    }

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);

    let outbound_timeout_seconds = i64_from_env("OUTBOUND_TIMEOUT_SECONDS")?.unwrap_or(10);

    let media_root = env::var("MEDIA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./media"));
    let media_base_url =
        env::var("MEDIA_BASE_URL").unwrap_or_else(|_| "http://localhost:3000/media".to_string());

    let event_webhook_url = env::var("EVENT_WEBHOOK_URL")
        .ok()
        .and_then(|value| normalize_optional(&value));
    let event_webhook_bearer = env::var("EVENT_WEBHOOK_BEARER")
        .ok()
        .and_then(|value| normalize_optional(&value));

    let tracking_fallback_ip =
        env::var("TRACKING_FALLBACK_IP").unwrap_or_else(|_| "176.28.159.76".to_string());

    let allowed_origins = env::var("ALLOWED_ORIGINS")
        .ok()
        .map(|value| parse_origins(&value))
        .unwrap_or_else(default_origins);

    Ok(AppConfig {
        database_url,
        host,
        port,
        token,
        outbound_timeout: Duration::from_secs(outbound_timeout_seconds.max(1) as u64),
        media_root,
        media_base_url,
        event_webhook_url,
        event_webhook_bearer,
        tracking_fallback_ip,
        allowed_origins,
    })
}

fn i64_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => {
            let parsed = value
                .trim()
                .parse::<i64>()
                .with_context(|| format!("Failed to parse {key}"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(|item| {
            let origin = item.trim();
            if origin.is_empty() {
                None
            } else {
                Some(origin.to_string())
            }
        })
        .collect()
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_origins_splits_on_separators() {
        let origins = parse_origins("http://a.test,http://b.test http://c.test");
        assert_eq!(origins.len(), 3);
        assert!(origins.contains(&"http://b.test".to_string()));
    }

    #[test]
    fn normalize_optional_drops_blank_values() {
        assert_eq!(normalize_optional("  "), None);
        assert_eq!(normalize_optional(" x "), Some("x".to_string()));
    }
}
