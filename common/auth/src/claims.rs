use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::Role;

/// Decoded session token payload. Field names are the wire contract:
/// `{userId, email, role, status?, iat, exp}`. `status` is present only on
/// login-issued tokens, never on registration-issued ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_uses_camel_case_user_id() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: Role::Merchant,
            status: None,
            iat: 1_700_000_000,
            exp: 1_700_086_400,
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("userId").is_some());
        assert!(value.get("user_id").is_none());
        assert!(value.get("status").is_none());
        assert_eq!(value["role"], "merchant");
    }

    #[test]
    fn status_survives_round_trip_when_present() {
        let claims = Claims {
            user_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: Role::Customer,
            status: Some("Active".to_string()),
            iat: 1_700_000_000,
            exp: 1_700_086_400,
        };
        let json = serde_json::to_string(&claims).unwrap();
        let back: Claims = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status.as_deref(), Some("Active"));
        assert_eq!(back.expires_at().unwrap().timestamp(), claims.exp);
    }
}
