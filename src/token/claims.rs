//! Access-token claim set and the role carried inside it.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Role fixed at account creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    SuperAdmin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::SuperAdmin => "SUPER_ADMIN",
        }
    }

    /// Landing page for a signed-in user of this role.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::User => "/home",
            Self::SuperAdmin => "/super-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "USER" => Ok(Self::User),
            "SUPER_ADMIN" => Ok(Self::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Who a verified access token speaks for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// JWT payload. Field names match what browser code already decodes (`userId`).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn new(identity: &Identity, issued_at: i64, ttl_seconds: i64) -> Self {
        Self {
            user_id: identity.user_id,
            email: identity.email.clone(),
            role: identity.role,
            iat: issued_at,
            exp: issued_at + ttl_seconds,
        }
    }

    #[must_use]
    pub fn into_identity(self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email,
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn role_serializes_screaming_snake_case() -> Result<()> {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin)?, "\"SUPER_ADMIN\"");
        assert_eq!(serde_json::from_str::<Role>("\"USER\"")?, Role::User);
        assert!(serde_json::from_str::<Role>("\"ADMIN\"").is_err());
        Ok(())
    }

    #[test]
    fn role_parses_database_values() {
        assert_eq!("SUPER_ADMIN".parse::<Role>(), Ok(Role::SuperAdmin));
        assert_eq!("USER".parse::<Role>(), Ok(Role::User));
        assert!("user".parse::<Role>().is_err());
    }

    #[test]
    fn claims_use_camel_case_user_id() -> Result<()> {
        let identity = Identity {
            user_id: Uuid::nil(),
            email: "ana@atelier.shop".to_string(),
            role: Role::User,
        };
        let value = serde_json::to_value(Claims::new(&identity, 100, 900))?;
        assert!(value.get("userId").is_some());
        assert_eq!(value.get("exp").and_then(serde_json::Value::as_i64), Some(1000));
        Ok(())
    }
}
