use std::fmt;

use crate::claims::Claims;
use crate::roles::Role;

/// Role checks run strictly after the auth gate; they assume claims are
/// already attached and perform no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardError {
    pub required: &'static [Role],
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.required {
            [Role::Admin] => f.write_str("Admin access required"),
            [Role::Merchant] => f.write_str("Merchant access required"),
            [Role::Admin, Role::Merchant] | [Role::Merchant, Role::Admin] => {
                f.write_str("Admin or Merchant access required")
            }
            required => {
                let names = required
                    .iter()
                    .map(Role::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Insufficient role. Required one of: {names}")
            }
        }
    }
}

impl std::error::Error for GuardError {}

pub fn ensure_role(claims: &Claims, allowed: &'static [Role]) -> Result<(), GuardError> {
    if allowed.is_empty() || allowed.contains(&claims.role) {
        Ok(())
    } else {
        Err(GuardError { required: allowed })
    }
}

pub fn require_admin(claims: &Claims) -> Result<(), GuardError> {
    ensure_role(claims, &[Role::Admin])
}

pub fn require_merchant(claims: &Claims) -> Result<(), GuardError> {
    ensure_role(claims, &[Role::Merchant])
}

pub fn require_admin_or_merchant(claims: &Claims) -> Result<(), GuardError> {
    ensure_role(claims, &[Role::Admin, Role::Merchant])
}
