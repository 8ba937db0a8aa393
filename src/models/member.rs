//! Member model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use validator::Validate;

use crate::error::AppError;

/// Role labels carried in tokens and stored with each member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Member,
    Librarian,
    Admin,
}

/// Roles allowed to run the lending desk
pub const STAFF: &[Role] = &[Role::Librarian, Role::Admin];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Librarian => "LIBRARIAN",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the "ROLE_" prefix some clients still send
        let label = s.trim().to_uppercase();
        match label.strip_prefix("ROLE_").unwrap_or(&label) {
            "MEMBER" => Ok(Role::Member),
            "LIBRARIAN" => Ok(Role::Librarian),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Internal row structure for database queries
#[derive(Debug, Clone, FromRow)]
pub struct MemberRow {
    id: i32,
    email: String,
    name: String,
    password: String,
    roles: Vec<String>,
    enabled: bool,
    account_non_expired: bool,
    account_non_locked: bool,
    credentials_non_expired: bool,
    profile_id: Option<i32>,
    crea_date: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = AppError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(AppError::Internal)?;

        Ok(Member {
            id: row.id,
            email: row.email,
            name: row.name,
            password: row.password,
            roles,
            enabled: row.enabled,
            account_non_expired: row.account_non_expired,
            account_non_locked: row.account_non_locked,
            credentials_non_expired: row.credentials_non_expired,
            profile_id: row.profile_id,
            crea_date: row.crea_date,
        })
    }
}

/// Lending-system account.
///
/// Serializes every field, including the password hash, because cache
/// regions may store members out of process. Handlers answer with
/// [`MemberResponse`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: i32,
    pub email: String,
    pub name: String,
    /// Hashed password (argon2)
    pub password: String,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
    pub account_non_expired: bool,
    pub account_non_locked: bool,
    pub credentials_non_expired: bool,
    pub profile_id: Option<i32>,
    pub crea_date: DateTime<Utc>,
}

impl Member {
    /// All four account gates must be open to authenticate
    pub fn is_active(&self) -> bool {
        self.enabled
            && self.account_non_expired
            && self.account_non_locked
            && self.credentials_non_expired
    }

    pub fn status(&self) -> AccountStatus {
        AccountStatus {
            enabled: self.enabled,
            account_non_expired: self.account_non_expired,
            account_non_locked: self.account_non_locked,
            credentials_non_expired: self.credentials_non_expired,
        }
    }

    pub fn with_status(&self, status: &AccountStatus) -> Member {
        Member {
            enabled: status.enabled,
            account_non_expired: status.account_non_expired,
            account_non_locked: status.account_non_locked,
            credentials_non_expired: status.credentials_non_expired,
            ..self.clone()
        }
    }
}

/// The four independent account gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    pub enabled: bool,
    pub account_non_expired: bool,
    pub account_non_locked: bool,
    pub credentials_non_expired: bool,
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self {
            enabled: true,
            account_non_expired: true,
            account_non_locked: true,
            credentials_non_expired: true,
        }
    }
}

/// Member as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct MemberResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub roles: BTreeSet<Role>,
    #[serde(flatten)]
    pub status: AccountStatus,
    pub profile_id: Option<i32>,
    pub crea_date: DateTime<Utc>,
}

impl From<Member> for MemberResponse {
    fn from(member: Member) -> Self {
        MemberResponse {
            status: member.status(),
            id: member.id,
            email: member.email,
            name: member.name,
            roles: member.roles,
            profile_id: member.profile_id,
            crea_date: member.crea_date,
        }
    }
}

/// Insert payload handed to the member store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
}

/// Self-registration request (always grants MEMBER)
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterMember {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Member creation by an administrator, with explicit roles
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMember {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub roles: BTreeSet<Role>,
}

/// Update member request; roles cannot change after registration
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateMember {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub name: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
}
