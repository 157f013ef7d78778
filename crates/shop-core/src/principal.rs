//! # Principal
//!
//! The signed-in account behind a request, as established by the session
//! layer in front of this service.

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::UserId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = CheckoutError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(CheckoutError::Unauthenticated(format!(
                "unknown role '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Principal {
    User {
        id: UserId,
        name: String,
        email: String,
    },
    Admin {
        id: UserId,
        name: String,
        email: String,
    },
}

impl Principal {
    /// Build a principal from its session fields; ids must be positive
    pub fn new(role: Role, id: UserId, name: String, email: String) -> CheckoutResult<Self> {
        if id <= 0 {
            return Err(CheckoutError::Unauthenticated(format!(
                "invalid user id {}",
                id
            )));
        }
        Ok(match role {
            Role::User => Principal::User { id, name, email },
            Role::Admin => Principal::Admin { id, name, email },
        })
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Principal::User { id, .. } | Principal::Admin { id, .. } => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Principal::User { .. } => Role::User,
            Principal::Admin { .. } => Role::Admin,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Principal::User { email, .. } | Principal::Admin { email, .. } => email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_from_session_fields() {
        let admin = Principal::new(Role::Admin, 3, "Ana".into(), "ana@example.com".into()).unwrap();
        assert_eq!(admin.user_id(), 3);
        assert_eq!(admin.role(), Role::Admin);

        assert!(Principal::new(Role::User, 0, String::new(), String::new()).is_err());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert!(matches!(
            "guest".parse::<Role>(),
            Err(CheckoutError::Unauthenticated(_))
        ));
    }
}
