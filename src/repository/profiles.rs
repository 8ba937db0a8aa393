//! Member profiles repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{profile::NewProfile, MemberProfile, PageQuery},
};

use super::ProfileStore;

#[derive(Clone)]
pub struct ProfilesRepository {
    pool: Pool<Postgres>,
}

impl ProfilesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfilesRepository {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<MemberProfile>> {
        let profile = sqlx::query_as::<_, MemberProfile>("SELECT * FROM member_profiles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<MemberProfile>> {
        let profile = sqlx::query_as::<_, MemberProfile>(
            "SELECT * FROM member_profiles WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_by_member(&self, member_id: i32) -> AppResult<Option<MemberProfile>> {
        let profile = sqlx::query_as::<_, MemberProfile>(
            "SELECT * FROM member_profiles WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<MemberProfile>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM member_profiles")
            .fetch_one(&self.pool)
            .await?;

        let profiles = sqlx::query_as::<_, MemberProfile>(
            "SELECT * FROM member_profiles ORDER BY last_name, first_name, id LIMIT $1 OFFSET $2",
        )
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((profiles, total))
    }

    async fn insert(&self, profile: &NewProfile) -> AppResult<MemberProfile> {
        let row = sqlx::query_as::<_, MemberProfile>(
            r#"
            INSERT INTO member_profiles (member_id, email, first_name, last_name, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(profile.member_id)
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.phone)
        .bind(&profile.address)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, profile: &MemberProfile) -> AppResult<MemberProfile> {
        sqlx::query_as::<_, MemberProfile>(
            r#"
            UPDATE member_profiles SET
                email = $1, first_name = $2, last_name = $3, phone = $4, address = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&profile.email)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.phone)
        .bind(&profile.address)
        .bind(profile.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Profile, profile.id))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM member_profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
