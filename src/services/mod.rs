//! Business logic services

pub mod borrowings;
pub mod cache;
pub mod catalog;
pub mod members;
pub mod profiles;
pub mod redis;
pub mod tokens;

use async_trait::async_trait;

use crate::{
    auth::policy::{Ownership, OwnershipResolver},
    config::AuthConfig,
    error::AppResult,
    repository::Repository,
};

use cache::Caches;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub tokens: tokens::TokenService,
    pub members: members::MembersService,
    pub profiles: profiles::ProfilesService,
    pub catalog: catalog::CatalogService,
    pub borrowings: borrowings::BorrowingsService,
    pub caches: Caches,
    repository: Repository,
}

impl Services {
    /// Create all services over the given repository and cache regions
    pub fn new(repository: Repository, caches: Caches, auth_config: &AuthConfig) -> Self {
        let members = members::MembersService::new(repository.clone(), caches.clone());
        let catalog = catalog::CatalogService::new(repository.clone(), caches.clone());

        Self {
            tokens: tokens::TokenService::new(members.clone(), auth_config),
            profiles: profiles::ProfilesService::new(
                repository.clone(),
                caches.clone(),
                members.clone(),
            ),
            borrowings: borrowings::BorrowingsService::new(
                repository.clone(),
                caches.clone(),
                catalog.clone(),
                members.clone(),
            ),
            members,
            catalog,
            caches,
            repository,
        }
    }

    /// Check that the database answers
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

#[async_trait]
impl OwnershipResolver for Services {
    async fn owner_email(&self, kind: Ownership, id: i32) -> AppResult<Option<String>> {
        match kind {
            Ownership::Member => Ok(self.members.find_by_id(id).await?.map(|m| m.email.clone())),
            Ownership::Profile => self.profiles.owner_email(id).await,
            Ownership::Borrowing => self.borrowings.owner_email(id).await,
        }
    }
}
