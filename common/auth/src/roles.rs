use serde::{Deserialize, Serialize};
use std::fmt;

/// Account roles carried in session token claims. Assigned once at
/// registration; role changes happen through an administrative side
/// channel, never through this subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Merchant,
    Admin,
}

pub const ALLOWED_ROLES: &[&str] = &["customer", "merchant", "admin"];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Merchant => "merchant",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "customer" => Some(Role::Customer),
            "merchant" => Some(Role::Merchant),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_allowed_roles_only() {
        for role in ALLOWED_ROLES {
            assert!(Role::parse(role).is_some());
        }
        assert!(Role::parse("superuser").is_none());
        assert!(Role::parse("Admin").is_none());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Merchant).unwrap(), "\"merchant\"");
    }
}
