//! Member accounts service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::{collections::BTreeSet, sync::Arc};

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        member::{AccountStatus, CreateMember, NewMember, RegisterMember, UpdateMember},
        BorrowingRecord, Member, Page, PageQuery, Role,
    },
    repository::Repository,
};

use super::cache::{CacheKey, Cached, Caches};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
    caches: Caches,
}

impl MembersService {
    pub fn new(repository: Repository, caches: Caches) -> Self {
        Self { repository, caches }
    }

    /// Cached lookup by id
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Arc<Member>>> {
        let store = self.repository.members.clone();
        self.caches
            .members
            .get_or_load(CacheKey::Id(id), || async move { store.find_by_id(id).await })
            .await
    }

    /// Cached lookup by login email
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Arc<Member>>> {
        let store = self.repository.members.clone();
        let email = email.trim().to_string();
        self.caches
            .members
            .get_or_load(CacheKey::email(&email), || async move {
                store.find_by_email(&email).await
            })
            .await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        self.find_by_id(id)
            .await?
            .map(|m| m.as_ref().clone())
            .ok_or_else(|| AppError::not_found(EntityKind::Member, id))
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<Member> {
        self.find_by_email(email)
            .await?
            .map(|m| m.as_ref().clone())
            .ok_or_else(|| {
                AppError::NotFound(EntityKind::Member, format!("No member with email {}", email))
            })
    }

    pub async fn list(&self, page: &PageQuery) -> AppResult<Page<Member>> {
        let (members, total) = self.repository.members.list(page).await?;
        Ok(Page::new(members, total, page))
    }

    /// Self-registration; always grants MEMBER
    pub async fn register(&self, request: RegisterMember) -> AppResult<Member> {
        self.insert(
            &request.email,
            &request.name,
            &request.password,
            BTreeSet::from([Role::Member]),
        )
        .await
    }

    /// Creation by an administrator, with explicit roles
    pub async fn create(&self, request: CreateMember) -> AppResult<Member> {
        self.insert(&request.email, &request.name, &request.password, request.roles)
            .await
    }

    async fn insert(
        &self,
        email: &str,
        name: &str,
        password: &str,
        roles: BTreeSet<Role>,
    ) -> AppResult<Member> {
        // Checked before touching the store at all
        if roles.is_empty() {
            return Err(AppError::Validation(
                "A member needs at least one role".to_string(),
            ));
        }

        let email = email.trim();
        if self.repository.members.email_exists(email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let member = self
            .repository
            .members
            .insert(&NewMember {
                email: email.to_string(),
                name: name.to_string(),
                password_hash: hash_password(password)?,
                roles,
            })
            .await?;

        tracing::info!(member_id = member.id, "member registered");
        Ok(member)
    }

    /// Update name, email or password
    pub async fn update(&self, id: i32, request: UpdateMember) -> AppResult<Member> {
        let current = self.get_by_id(id).await?;

        if let Some(ref email) = request.email {
            if !email.trim().eq_ignore_ascii_case(&current.email)
                && self.repository.members.email_exists(email.trim(), Some(id)).await?
            {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let password = match request.password {
            Some(ref password) => hash_password(password)?,
            None => current.password.clone(),
        };

        let updated = Member {
            email: request
                .email
                .as_deref()
                .map(|e| e.trim().to_string())
                .unwrap_or_else(|| current.email.clone()),
            name: request.name.clone().unwrap_or_else(|| current.name.clone()),
            password,
            ..current.clone()
        };

        let saved = self.save(&current, updated).await?;

        if !saved.email.eq_ignore_ascii_case(&current.email) {
            self.follow_email_change(&saved).await?;
        }

        Ok(saved)
    }

    /// Open or close the account gates (administrators only)
    pub async fn update_status(&self, id: i32, status: AccountStatus) -> AppResult<Member> {
        let current = self.get_by_id(id).await?;
        let updated = current.with_status(&status);
        self.save(&current, updated).await
    }

    /// Persist `updated` and refresh every cache key of the member.
    ///
    /// Identical data is a no-op: no store write and the cached entry is
    /// left untouched.
    pub(crate) async fn save(&self, current: &Member, updated: Member) -> AppResult<Member> {
        if &updated == current {
            tracing::debug!(member_id = current.id, "member unchanged, skipping write");
            return Ok(updated);
        }

        let saved = self.repository.members.update(&updated).await?;
        self.caches.members.replace(current, saved.clone()).await?;
        Ok(saved)
    }

    /// Keep the profile's copy of the email (its second cache key) in step
    async fn follow_email_change(&self, member: &Member) -> AppResult<()> {
        let Some(profile) = self.repository.profiles.find_by_member(member.id).await? else {
            return Ok(());
        };

        let previous = profile.clone();
        let profile = crate::models::MemberProfile {
            email: member.email.clone(),
            ..profile
        };
        let saved = self.repository.profiles.update(&profile).await?;
        self.caches.profiles.replace(&previous, saved).await?;
        Ok(())
    }

    /// Delete a member without active borrowings.
    ///
    /// The returned records and the profile go first, since both reference
    /// the member row.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let member = self.get_by_id(id).await?;

        let active = self.repository.borrowings.count_active_by_member(id).await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "Member has {} active borrowing(s)",
                active
            )));
        }

        let history = self.repository.borrowings.list_by_member(id, false).await?;
        for record in &history {
            self.repository.borrowings.delete(record.id).await?;
            self.caches.borrowings.evict(&record.cache_keys()).await?;
        }

        if let Some(profile) = self.repository.profiles.find_by_member(id).await? {
            self.repository.profiles.delete(profile.id).await?;
            self.caches.profiles.evict(&profile.cache_keys()).await?;
        }

        self.repository.members.delete(id).await?;
        self.caches.members.evict(&member.cache_keys()).await?;

        tracing::info!(member_id = id, records = history.len(), "member deleted");
        Ok(())
    }

    /// Borrowing records of a member, optionally only the unreturned ones
    pub async fn borrowings(&self, member_id: i32, active_only: bool) -> AppResult<Vec<BorrowingRecord>> {
        self.get_by_id(member_id).await?;
        self.repository
            .borrowings
            .list_by_member(member_id, active_only)
            .await
    }
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
