//! Caller identity
//!
//! The transport layer authenticates callers and hands the core a verified
//! `Actor`. Domain services perform their own role checks so that
//! authorization travels with the operation rather than the route.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Roles recognised by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Student => "student",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "parent" => Ok(Role::Parent),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A verified caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Identifier of the authenticated user
    pub id: Uuid,
    /// Verified role
    pub role: Role,
}

impl Actor {
    /// Creates an actor with the given role
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    /// Convenience constructor for an admin actor
    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    /// Returns true if the actor holds the required role
    pub fn has_role(&self, required: Role) -> bool {
        self.role == required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn test_has_role() {
        let actor = Actor::admin(Uuid::new_v4());
        assert!(actor.has_role(Role::Admin));
        assert!(!actor.has_role(Role::Parent));
    }
}
