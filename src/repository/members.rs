//! Members repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult, EntityKind},
    models::{
        member::{MemberRow, NewMember},
        Member, PageQuery,
    },
};

use super::MemberStore;

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberStore for MembersRepository {
    /// Get member by ID
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Member>> {
        sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Member::try_from)
            .transpose()
    }

    /// Get member by login email
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Member::try_from)
            .transpose()
    }

    /// List members with pagination
    async fn list(&self, page: &PageQuery) -> AppResult<(Vec<Member>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, MemberRow>(
            "SELECT * FROM members ORDER BY name, id LIMIT $1 OFFSET $2",
        )
        .bind(page.per_page())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let members = rows
            .into_iter()
            .map(Member::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((members, total))
    }

    /// Create a new member
    async fn insert(&self, member: &NewMember) -> AppResult<Member> {
        let roles: Vec<String> = member.roles.iter().map(|r| r.as_str().to_string()).collect();

        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            INSERT INTO members (email, name, password, roles)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&member.email)
        .bind(&member.name)
        .bind(&member.password_hash)
        .bind(&roles)
        .fetch_one(&self.pool)
        .await?;

        Member::try_from(row)
    }

    /// Persist every mutable column; roles are left untouched
    async fn update(&self, member: &Member) -> AppResult<Member> {
        sqlx::query_as::<_, MemberRow>(
            r#"
            UPDATE members SET
                email = $1,
                name = $2,
                password = $3,
                enabled = $4,
                account_non_expired = $5,
                account_non_locked = $6,
                credentials_non_expired = $7,
                profile_id = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(&member.email)
        .bind(&member.name)
        .bind(&member.password)
        .bind(member.enabled)
        .bind(member.account_non_expired)
        .bind(member.account_non_locked)
        .bind(member.credentials_non_expired)
        .bind(member.profile_id)
        .bind(member.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found(EntityKind::Member, member.id))
        .and_then(Member::try_from)
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Check if email already exists
    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }
}
