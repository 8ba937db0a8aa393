//! Member profiles service

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        profile::{CreateProfile, NewProfile, UpdateProfile},
        Member, MemberProfile, Page, PageQuery,
    },
    repository::Repository,
};

use super::{
    cache::{CacheKey, Cached, Caches},
    members::MembersService,
};

#[derive(Clone)]
pub struct ProfilesService {
    repository: Repository,
    caches: Caches,
    members: MembersService,
}

impl ProfilesService {
    pub fn new(repository: Repository, caches: Caches, members: MembersService) -> Self {
        Self {
            repository,
            caches,
            members,
        }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Arc<MemberProfile>>> {
        let store = self.repository.profiles.clone();
        self.caches
            .profiles
            .get_or_load(CacheKey::Id(id), || async move { store.find_by_id(id).await })
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Arc<MemberProfile>>> {
        let store = self.repository.profiles.clone();
        let email = email.trim().to_string();
        self.caches
            .profiles
            .get_or_load(CacheKey::email(&email), || async move {
                store.find_by_email(&email).await
            })
            .await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<MemberProfile> {
        self.find_by_id(id)
            .await?
            .map(|p| p.as_ref().clone())
            .ok_or_else(|| AppError::not_found(EntityKind::Profile, id))
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<MemberProfile> {
        self.find_by_email(email)
            .await?
            .map(|p| p.as_ref().clone())
            .ok_or_else(|| {
                AppError::NotFound(EntityKind::Profile, format!("No profile for email {}", email))
            })
    }

    pub async fn list(&self, page: &PageQuery) -> AppResult<Page<MemberProfile>> {
        let (profiles, total) = self.repository.profiles.list(page).await?;
        Ok(Page::new(profiles, total, page))
    }

    /// Create the profile of the member named by `member_email`
    pub async fn create(&self, request: CreateProfile) -> AppResult<MemberProfile> {
        let member = self.members.get_by_email(&request.member_email).await?;

        if self.repository.profiles.find_by_member(member.id).await?.is_some() {
            return Err(AppError::InvalidState(format!(
                "Member {} already has a profile",
                member.id
            )));
        }

        let profile = self
            .repository
            .profiles
            .insert(&NewProfile {
                member_id: member.id,
                email: member.email.clone(),
                first_name: request.first_name,
                last_name: request.last_name,
                phone: request.phone,
                address: request.address,
            })
            .await?;

        // Back-reference on the member
        let linked = Member {
            profile_id: Some(profile.id),
            ..member.clone()
        };
        self.members.save(&member, linked).await?;

        tracing::info!(member_id = member.id, profile_id = profile.id, "profile created");
        Ok(profile)
    }

    pub async fn update(&self, id: i32, request: UpdateProfile) -> AppResult<MemberProfile> {
        let current = self.get_by_id(id).await?;
        let updated = current.merged(&request);

        if updated == current {
            return Ok(updated);
        }

        let saved = self.repository.profiles.update(&updated).await?;
        self.caches.profiles.replace(&current, saved.clone()).await?;
        Ok(saved)
    }

    /// Clear the member's back-reference first, then delete and evict
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let profile = self.get_by_id(id).await?;

        if let Some(member) = self.members.find_by_id(profile.member_id).await? {
            let unlinked = Member {
                profile_id: None,
                ..member.as_ref().clone()
            };
            self.members.save(&member, unlinked).await?;
        }

        self.repository.profiles.delete(id).await?;
        self.caches.profiles.evict(&profile.cache_keys()).await?;

        tracing::info!(profile_id = id, "profile deleted");
        Ok(())
    }

    /// Email of the member owning the profile
    pub async fn owner_email(&self, id: i32) -> AppResult<Option<String>> {
        Ok(self.find_by_id(id).await?.map(|p| p.email.clone()))
    }
}
