//! Member profile model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Personal details attached to a member, at most one per member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MemberProfile {
    pub id: i32,
    pub member_id: i32,
    /// Owning member's email, second cache key
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Create profile request; `member_email` names the owning member
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProfile {
    #[validate(email(message = "Invalid email format"))]
    pub member_email: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Insert payload handed to the profile store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub member_id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl MemberProfile {
    pub fn merged(&self, update: &UpdateProfile) -> MemberProfile {
        MemberProfile {
            id: self.id,
            member_id: self.member_id,
            email: self.email.clone(),
            first_name: update.first_name.clone().unwrap_or_else(|| self.first_name.clone()),
            last_name: update.last_name.clone().unwrap_or_else(|| self.last_name.clone()),
            phone: update.phone.clone().or_else(|| self.phone.clone()),
            address: update.address.clone().or_else(|| self.address.clone()),
        }
    }
}
