use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OwnerId;
use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Role granted at registration. An admin code only counts when one is
    /// configured and the supplied code matches it exactly.
    pub fn for_signup(code: Option<&str>, configured: Option<&str>) -> Self {
        match (code, configured) {
            (Some(code), Some(expected)) if !expected.is_empty() && code == expected => {
                Self::Admin
            }
            _ => Self::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A registered user as kept in the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: OwnerId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Set by the directory on registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: OwnerId::new(id),
            email: String::new(),
            display_name: String::new(),
            role: Role::User,
            photo_url: None,
            created_at: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// User ids end up in storage paths, so they must be a single plain segment.
pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ValidationError::MissingUserId);
    }
    if id == "." || id.contains("..") || id.contains(['/', '\\']) {
        return Err(ValidationError::InvalidUserId);
    }
    Ok(())
}
