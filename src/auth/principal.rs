//! Resolved caller identity for one request

use std::collections::BTreeSet;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{AccountStatus, STAFF},
        Member, Role,
    },
};

/// Identity and roles of the caller.
///
/// Built per request by the authentication gate and stored in the request
/// extensions; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub member_id: i32,
    pub email: String,
    /// Granted authorities, taken from the token's roles claim
    pub roles: BTreeSet<Role>,
    pub status: AccountStatus,
}

impl Principal {
    /// Principal for `member` with the roles carried by its token
    pub fn new(member: &Member, roles: BTreeSet<Role>) -> Self {
        Self {
            member_id: member.id,
            email: member.email.clone(),
            roles,
            status: member.status(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn is_staff(&self) -> bool {
        self.has_any_role(STAFF)
    }

    /// Whether `email` names this principal (emails compare case-insensitively)
    pub fn is(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    pub fn require_staff(&self) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.has_role(Role::Admin) {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}
